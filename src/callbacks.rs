use std::fmt;

use crate::ecg::BeatEvent;

/// Event categories listeners can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RawSample,
    FilteredSample,
    Heartbeat,
    Init,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::RawSample,
        EventKind::FilteredSample,
        EventKind::Heartbeat,
        EventKind::Init,
    ];

    fn slot(self) -> usize {
        match self {
            EventKind::RawSample => 0,
            EventKind::FilteredSample => 1,
            EventKind::Heartbeat => 2,
            EventKind::Init => 3,
        }
    }
}

/// An event together with its payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// Sample as it arrived, in volts
    RawSample(f32),
    /// Sample after the mains notch
    FilteredSample(f32),
    Heartbeat(BeatEvent),
    /// Detector initialised at this sample rate; 0 when initialisation failed
    Init(f32),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::RawSample(_) => EventKind::RawSample,
            Event::FilteredSample(_) => EventKind::FilteredSample,
            Event::Heartbeat(_) => EventKind::Heartbeat,
            Event::Init(_) => EventKind::Init,
        }
    }
}

/// Listener function type
pub type ListenerFn = Box<dyn FnMut(&Event) + Send>;

/// Ordered listener lists, one per [`EventKind`]
///
/// Listeners run synchronously on the dispatching thread in the order they
/// were registered. There is no per-listener removal; [`clear_all`] drops
/// every listener at once.
///
/// [`clear_all`]: CallbackRegistry::clear_all
#[derive(Default)]
pub struct CallbackRegistry {
    listeners: [Vec<ListenerFn>; 4],
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `kind`
    ///
    /// The listener only ever sees events of that kind.
    pub fn register<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        let list = &mut self.listeners[kind.slot()];
        list.push(Box::new(listener));
        log::debug!("Registered {:?} listener #{}", kind, list.len());
    }

    pub fn register_heartbeat<F>(&mut self, mut listener: F)
    where
        F: FnMut(BeatEvent) + Send + 'static,
    {
        self.register(EventKind::Heartbeat, move |event| {
            if let Event::Heartbeat(beat) = event {
                listener(*beat);
            }
        });
    }

    pub fn register_raw_sample<F>(&mut self, mut listener: F)
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.register(EventKind::RawSample, move |event| {
            if let Event::RawSample(v) = event {
                listener(*v);
            }
        });
    }

    pub fn register_filtered_sample<F>(&mut self, mut listener: F)
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.register(EventKind::FilteredSample, move |event| {
            if let Event::FilteredSample(v) = event {
                listener(*v);
            }
        });
    }

    pub fn register_init<F>(&mut self, mut listener: F)
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.register(EventKind::Init, move |event| {
            if let Event::Init(rate) = event {
                listener(*rate);
            }
        });
    }

    /// Invoke every listener registered for the event's kind
    pub fn dispatch(&mut self, event: Event) {
        for listener in self.listeners[event.kind().slot()].iter_mut() {
            listener(&event);
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners[kind.slot()].len()
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        !self.listeners[kind.slot()].is_empty()
    }

    pub fn clear_all(&mut self) {
        for list in self.listeners.iter_mut() {
            list.clear();
        }
        log::debug!("Cleared all listeners");
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in EventKind::ALL {
            map.entry(&kind, &self.listener_count(kind));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn beat(index: u64) -> BeatEvent {
        BeatEvent {
            sample_index: index,
            bpm: 60.0,
            amplitude: 1.0,
            confidence: 2.0,
        }
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let mut registry = CallbackRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let log = Arc::clone(&log);
            registry.register_heartbeat(move |_| log.lock().unwrap().push(id));
        }

        registry.dispatch(Event::Heartbeat(beat(10)));
        registry.dispatch(Event::Heartbeat(beat(20)));
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_kinds_are_isolated() {
        let mut registry = CallbackRegistry::new();
        let raw = Arc::new(Mutex::new(Vec::new()));
        let filtered = Arc::new(Mutex::new(Vec::new()));

        let r = Arc::clone(&raw);
        registry.register_raw_sample(move |v| r.lock().unwrap().push(v));
        let f = Arc::clone(&filtered);
        registry.register_filtered_sample(move |v| f.lock().unwrap().push(v));

        registry.dispatch(Event::RawSample(0.5));
        registry.dispatch(Event::FilteredSample(0.25));
        registry.dispatch(Event::Init(250.0));

        assert_eq!(*raw.lock().unwrap(), vec![0.5]);
        assert_eq!(*filtered.lock().unwrap(), vec![0.25]);
    }

    #[test]
    fn test_heartbeat_payload_is_copied() {
        let mut registry = CallbackRegistry::new();
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        registry.register_heartbeat(move |b| *s.lock().unwrap() = Some(b));

        registry.dispatch(Event::Heartbeat(beat(42)));
        assert_eq!(*seen.lock().unwrap(), Some(beat(42)));
    }

    #[test]
    fn test_generic_register_sees_event() {
        let mut registry = CallbackRegistry::new();
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        registry.register(EventKind::Init, move |event| {
            assert_eq!(event.kind(), EventKind::Init);
            *c.lock().unwrap() += 1;
        });

        registry.dispatch(Event::Init(500.0));
        registry.dispatch(Event::RawSample(1.0));
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_clear_all() {
        let mut registry = CallbackRegistry::new();
        let count = Arc::new(Mutex::new(0));
        for kind in EventKind::ALL {
            let c = Arc::clone(&count);
            registry.register(kind, move |_| *c.lock().unwrap() += 1);
        }
        assert_eq!(registry.listener_count(EventKind::Heartbeat), 1);

        registry.clear_all();
        for kind in EventKind::ALL {
            assert!(!registry.has_listeners(kind));
        }
        registry.dispatch(Event::Heartbeat(beat(1)));
        registry.dispatch(Event::RawSample(0.0));
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_dispatch_without_listeners() {
        let mut registry = CallbackRegistry::new();
        registry.dispatch(Event::FilteredSample(1.0));
        assert_eq!(format!("{:?}", registry).matches(": 0").count(), 4);
    }
}
