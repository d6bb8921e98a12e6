use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use foundation::GeoPoint;
use foundation::math::{GlobeCoord, from_engine_globe};
use runtime::Frame;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use viewsync::sim::{SimBackend, SimGeolocation};
use viewsync::{
    CameraTarget, Fix, MapView, PositionError, PositionErrorKind, RenderTarget, ViewEvent,
    ViewerConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive a dual 2D/3D map view against simulated engines")]
struct Args {
    /// JSON viewer config; built-in defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Longitude the simulated device reports
    #[arg(long, default_value_t = -122.42, allow_negative_numbers = true)]
    lon: f64,

    /// Latitude the simulated device reports
    #[arg(long, default_value_t = 37.77, allow_negative_numbers = true)]
    lat: f64,

    /// Deny the location permission prompt
    #[arg(long)]
    deny: bool,

    /// Simulate a platform without geolocation
    #[arg(long)]
    no_geolocation: bool,

    /// Start with the globe enabled
    #[arg(long)]
    globe: bool,

    /// Actions to run in order, comma-separated
    #[arg(long, value_enum, value_delimiter = ',', default_value = "locate,toggle")]
    script: Vec<Action>,

    /// Frame length in milliseconds
    #[arg(long, default_value_t = 16)]
    frame_ms: u32,

    /// Print the final snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Print the effective config and exit
    #[arg(long)]
    print_config: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Request the device position and fly to it
    Locate,
    /// Switch between 2D and 3D
    Toggle,
    /// Remove the location marker
    Clear,
    /// Return to the initial view
    Reset,
    /// Fly to the configured initial center
    Home,
    Hide,
    Show,
    Destroy,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = real_main(Args::parse()) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn real_main(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    if args.globe {
        config.start_in_globe = true;
    }
    config.validate()?;

    if args.print_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }
    if args.frame_ms == 0 {
        bail!("--frame-ms must be positive");
    }

    let mut backend = SimBackend::new();
    let mut view = MapView::mount(
        &mut backend,
        geolocation_for(&args),
        &config,
        &RenderTarget::new("map"),
    )
    .context("mounting view")?;

    view.observe(|event| {
        if let ViewEvent::Notice(notice) = &event.payload {
            eprintln!("alert: {}", notice.message());
        }
        match serde_json::to_string(&event.payload) {
            Ok(json) => info!(seq = event.seq, %json, "view event"),
            Err(err) => warn!(seq = event.seq, %err, "unserializable view event"),
        }
    });
    for event in view.drain_events() {
        info!(seq = event.seq, event = ?event.payload, "view event during mount");
    }

    let dt_s = f64::from(args.frame_ms) / 1000.0;
    let settle = Frame::count_for_ms(dt_s, config.locate.duration_ms).max(1);
    let mut frame = Frame::first(dt_s);

    for action in &args.script {
        run_action(&mut view, &config, *action).with_context(|| format!("action {action:?}"))?;
        for f in frame.run(settle) {
            backend.advance(f.dt_s);
        }
        frame = Frame::new(frame.index + settle, dt_s);
    }
    view.drain_events();

    let snapshot = view.snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("state:    {:?}", snapshot.state);
        if let Some(button) = view.toggle_button() {
            println!("button:   {} ({})", button.text, button.title);
        }
        if let Some(zoom) = snapshot.zoom {
            println!("{}", viewsync::format_zoom(zoom));
        }
        match snapshot.location {
            Some([lon, lat]) => println!("location: {lon:.4}, {lat:.4}"),
            None => println!("location: none"),
        }
        let camera = backend.globe_probe().and_then(|globe| globe.camera());
        println!("globe:    {}", globe_camera_text(camera));
        println!("elapsed:  {:.3}s over {} frames", frame.elapsed_s(), frame.index);
    }
    Ok(())
}

/// Where the globe camera ended up, as lon/lat and height.
fn globe_camera_text(camera: Option<GlobeCoord>) -> String {
    match camera.map(from_engine_globe) {
        Some(Ok(p)) => format!(
            "{:.4}, {:.4} at {:.0} m",
            p.lon_deg(),
            p.lat_deg(),
            p.alt_m().unwrap_or(0.0)
        ),
        Some(Err(err)) => format!("unreadable ({err})"),
        None => "never flown".to_string(),
    }
}

fn geolocation_for(args: &Args) -> SimGeolocation {
    let mut geo = SimGeolocation::granted(Fix::new(args.lon, args.lat));
    if args.deny {
        geo.set_outcome(Err(PositionError::new(
            PositionErrorKind::PermissionDenied,
            "User denied Geolocation",
        )));
    }
    if args.no_geolocation {
        geo.set_available(false);
    }
    geo
}

fn run_action(
    view: &mut MapView<SimBackend, SimGeolocation>,
    config: &ViewerConfig,
    action: Action,
) -> Result<()> {
    match action {
        Action::Locate => view.locate_user(),
        Action::Toggle => {
            let mode = view.toggle()?;
            info!(?mode, "toggled");
        }
        Action::Clear => {
            if !view.clear_location()? {
                info!("no location to clear");
            }
        }
        Action::Reset => view.reset_view()?,
        Action::Home => {
            let home = config.initial_view;
            let center = GeoPoint::new(home.center_lon_deg, home.center_lat_deg)?;
            let target = CameraTarget::new(
                center,
                home.zoom,
                config.locate.altitude_m,
                config.locate.duration_ms,
            )?;
            view.fly_to(&target)?;
        }
        Action::Hide => {
            view.set_marker_visible(false)?;
        }
        Action::Show => {
            view.set_marker_visible(true)?;
        }
        Action::Destroy => {
            let report = view.destroy();
            for fault in &report.faults {
                warn!(%fault, "teardown fault");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use foundation::GeoPoint;
    use foundation::math::geo_to_ecef;

    use super::{Action, Args, geolocation_for, globe_camera_text};
    use viewsync::GeolocationProvider;

    #[test]
    fn parses_script_and_negative_longitude() {
        let args = Args::try_parse_from([
            "viewsync",
            "--lon",
            "-0.1276",
            "--lat",
            "51.5072",
            "--script",
            "locate,toggle,clear",
        ])
        .unwrap();
        assert_eq!(args.lon, -0.1276);
        assert_eq!(args.script, vec![Action::Locate, Action::Toggle, Action::Clear]);
    }

    #[test]
    fn default_script_locates_then_toggles() {
        let args = Args::try_parse_from(["viewsync"]).unwrap();
        assert_eq!(args.script, vec![Action::Locate, Action::Toggle]);
        assert_eq!(args.frame_ms, 16);
    }

    #[test]
    fn no_geolocation_flag_disables_provider() {
        let args = Args::try_parse_from(["viewsync", "--no-geolocation"]).unwrap();
        assert!(!geolocation_for(&args).is_available());
    }

    #[test]
    fn globe_camera_reads_back_as_lon_lat_height() {
        let sf = GeoPoint::new(-122.42, 37.77).unwrap();
        assert_eq!(
            globe_camera_text(Some(geo_to_ecef(sf, 1000.0))),
            "-122.4200, 37.7700 at 1000 m"
        );
        assert_eq!(globe_camera_text(None), "never flown");
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(Args::try_parse_from(["viewsync", "--script", "teleport"]).is_err());
    }
}
