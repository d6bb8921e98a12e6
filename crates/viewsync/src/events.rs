use runtime::EventBus;
use serde::Serialize;

use crate::controller::{ToggleButton, ViewMode};
use crate::error::ViewError;

/// User-facing message the host shows in a blocking dialog.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    CapabilityUnavailable,
    PositionUnavailable,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Notice::CapabilityUnavailable => "Geolocation is not supported by your browser",
            Notice::PositionUnavailable => "Unable to retrieve your location",
        }
    }

    /// The notice a failed locate request surfaces, if any.
    pub fn for_error(err: &ViewError) -> Option<Notice> {
        match err {
            ViewError::CapabilityUnavailable => Some(Notice::CapabilityUnavailable),
            ViewError::PositionUnavailable(_) | ViewError::InvalidCoordinate(_) => {
                Some(Notice::PositionUnavailable)
            }
            _ => None,
        }
    }
}

/// What a view reports to its host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ViewEvent {
    Notice(Notice),
    ZoomReadout(String),
    ModeChanged { mode: ViewMode, button: ToggleButton },
    MarkerMoved { lon_deg: f64, lat_deg: f64 },
    MarkerCleared,
}

pub type ViewEventBus = EventBus<ViewEvent>;

#[cfg(test)]
mod tests {
    use super::{Notice, ViewEvent};
    use crate::error::ViewError;
    use crate::locate::{PositionError, PositionErrorKind};

    #[test]
    fn notices_carry_user_text() {
        assert_eq!(
            Notice::CapabilityUnavailable.message(),
            "Geolocation is not supported by your browser"
        );
        assert_eq!(
            Notice::PositionUnavailable.message(),
            "Unable to retrieve your location"
        );
    }

    #[test]
    fn denied_permission_maps_to_position_notice() {
        let err = ViewError::PositionUnavailable(PositionError::new(
            PositionErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(Notice::for_error(&err), Some(Notice::PositionUnavailable));
        assert_eq!(
            Notice::for_error(&ViewError::InvalidCameraTarget("zoom NaN".into())),
            None
        );
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let json = serde_json::to_value(ViewEvent::ZoomReadout("Zoom: 2.00".into())).unwrap();
        assert_eq!(json["kind"], "zoom_readout");
        assert_eq!(json["data"], "Zoom: 2.00");
        let json = serde_json::to_value(ViewEvent::MarkerCleared).unwrap();
        assert_eq!(json["kind"], "marker_cleared");
    }
}
