//! Duplicate-suppressing diagnostics for per-tick code paths.

use std::{collections::HashMap, fmt, hash::Hash};

/// Ticks a key stays quiet after printing.
pub const DEFAULT_COOLDOWN: u32 = 100;

struct Entry {
    message: String,
    ticks_left: u32,
    pending: bool,
}

/// Rate-limits messages per key.
///
/// The first message for a key goes straight to the sink. Further
/// messages during the cooldown only replace the stored one, which is
/// flushed when the cooldown runs out. A key with nothing pending at that
/// point is forgotten.
pub struct Debouncer<K> {
    cooldown: u32,
    entries: HashMap<K, Entry>,
    sink: Box<dyn FnMut(&K, &str)>,
}

impl<K: Eq + Hash + fmt::Debug + 'static> Debouncer<K> {
    /// Debouncer forwarding to `tracing::debug!`.
    pub fn new() -> Self {
        Self::with_sink(DEFAULT_COOLDOWN, |key: &K, message: &str| {
            tracing::debug!(?key, "{message}");
        })
    }
}

impl<K: Eq + Hash> Debouncer<K> {
    pub fn with_sink(cooldown: u32, sink: impl FnMut(&K, &str) + 'static) -> Self {
        Self {
            cooldown,
            entries: HashMap::new(),
            sink: Box::new(sink),
        }
    }

    pub fn log(&mut self, key: K, message: impl Into<String>) {
        let message = message.into();
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.message = message;
            entry.pending = true;
        } else {
            (self.sink)(&key, &message);
            self.entries.insert(
                key,
                Entry {
                    message,
                    ticks_left: self.cooldown,
                    pending: false,
                },
            );
        }
    }

    pub fn tick(&mut self) {
        let sink = &mut self.sink;
        let cooldown = self.cooldown;
        self.entries.retain(|key, entry| {
            entry.ticks_left = entry.ticks_left.saturating_sub(1);
            if entry.ticks_left > 0 {
                return true;
            }
            if entry.pending {
                sink(key, &entry.message);
                entry.pending = false;
                entry.ticks_left = cooldown;
                true
            } else {
                false
            }
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash + fmt::Debug + 'static> Default for Debouncer<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for Debouncer<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("cooldown", &self.cooldown)
            .field("keys", &self.entries.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    fn recording(cooldown: u32) -> (Debouncer<&'static str>, Rc<RefCell<Vec<String>>>) {
        let out = Rc::new(RefCell::new(Vec::new()));
        let sink_out = Rc::clone(&out);
        let debouncer = Debouncer::with_sink(cooldown, move |key: &&str, msg: &str| {
            sink_out.borrow_mut().push(format!("{key}: {msg}"));
        });
        (debouncer, out)
    }

    #[test]
    fn first_message_is_immediate_and_repeats_are_held() {
        let (mut log, out) = recording(3);
        log.log("lander", "one");
        log.log("lander", "two");
        log.log("lander", "three");
        assert_eq!(*out.borrow(), vec!["lander: one"]);
        log.tick();
        log.tick();
        assert_eq!(out.borrow().len(), 1);
        log.tick();
        assert_eq!(*out.borrow(), vec!["lander: one", "lander: three"]);
    }

    #[test]
    fn idle_keys_are_forgotten() {
        let (mut log, out) = recording(2);
        log.log("a", "x");
        log.tick();
        log.tick();
        assert!(log.is_empty());
        log.log("a", "y");
        assert_eq!(*out.borrow(), vec!["a: x", "a: y"]);
    }
}
