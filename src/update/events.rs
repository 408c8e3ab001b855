use std::path::PathBuf;

use tracing::debug;

type Listener = Box<dyn Fn(&[PathBuf]) + Send + Sync>;

/// Publishes the paths changed by an update round to subscribed listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl Fn(&[PathBuf]) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn publish_updated_files(&self, paths: &[PathBuf]) {
        debug!(paths = paths.len(), listeners = self.listeners.len(), "files updated");
        for l in &self.listeners {
            l(paths);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn every_listener_sees_the_paths() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |paths| seen.lock().unwrap().push(paths.len()));
        }
        bus.publish_updated_files(&[PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(*seen.lock().unwrap(), vec![2, 2]);
    }
}
