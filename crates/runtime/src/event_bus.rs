/// A sequenced event as recorded by the [`EventBus`].
#[derive(Debug, Clone, PartialEq)]
pub struct Event<E> {
    /// Monotonic, 0-based emission order.
    pub seq: u64,
    pub payload: E,
}

pub type Observer<E> = Box<dyn FnMut(&Event<E>)>;

/// Single-threaded event queue with push observers.
///
/// Every emitted event is handed to the observers immediately (hosts use this
/// to update UI), then buffered until drained. With a capacity limit the
/// oldest buffered events are discarded first; observers still see them.
pub struct EventBus<E> {
    next_seq: u64,
    events: Vec<Event<E>>,
    observers: Vec<Observer<E>>,
    max_buffered: Option<usize>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            events: Vec::new(),
            observers: Vec::new(),
            max_buffered: None,
        }
    }
}

impl<E: std::fmt::Debug> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("next_seq", &self.next_seq)
            .field("events", &self.events)
            .field("observers", &self.observers.len())
            .field("max_buffered", &self.max_buffered)
            .finish()
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_buffered(max_buffered: usize) -> Self {
        Self {
            max_buffered: Some(max_buffered),
            ..Self::default()
        }
    }

    /// Registers an observer. Observers must not emit into the same bus.
    pub fn observe(&mut self, observer: impl FnMut(&Event<E>) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn emit(&mut self, payload: E) -> u64 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let event = Event { seq, payload };
        for observer in &mut self.observers {
            observer(&event);
        }

        if let Some(max) = self.max_buffered {
            if max == 0 {
                return seq;
            }
            if self.events.len() >= max {
                let overflow = self.events.len() + 1 - max;
                self.events.drain(..overflow);
            }
        }
        self.events.push(event);
        seq
    }

    pub fn drain(&mut self) -> Vec<Event<E>> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
