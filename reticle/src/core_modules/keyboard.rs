// Edge detection over a pull-based key sampler.
//
// `sample()` takes the current snapshot; `pressed_keys()` and `released_keys()`
// diff it against the previous one; `advance()` promotes the current snapshot to
// "previous". `advance()` must run exactly once per loop iteration. Skipping it
// makes every held key look freshly pressed, and releases are never seen.

use crate::core_modules::devices::{Key, KeySampler};
use crate::error::Result;
use std::collections::HashSet;
use tracing::warn;

pub struct KeyboardState<S> {
    sampler: S,
    previous: HashSet<Key>,
    current: HashSet<Key>,
    advanced: bool,
}

impl<S: KeySampler> KeyboardState<S> {
    pub fn new(sampler: S) -> Self {
        Self {
            sampler,
            previous: HashSet::new(),
            current: HashSet::new(),
            advanced: true,
        }
    }

    /// Reads the held keys from the sampler into the current snapshot.
    pub fn sample(&mut self) -> Result<()> {
        if !self.advanced {
            warn!("keyboard sampled twice without advancing; edge detection will miss transitions");
        }
        self.current = self.sampler.held_keys()?;
        self.advanced = false;
        Ok(())
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.current.contains(&key)
    }

    /// Keys held now but not in the previous snapshot.
    pub fn pressed_keys(&self) -> HashSet<Key> {
        self.current.difference(&self.previous).copied().collect()
    }

    /// Keys held in the previous snapshot but not now.
    pub fn released_keys(&self) -> HashSet<Key> {
        self.previous.difference(&self.current).copied().collect()
    }

    pub fn was_pressed(&self, key: Key) -> bool {
        self.current.contains(&key) && !self.previous.contains(&key)
    }

    pub fn was_released(&self, key: Key) -> bool {
        self.previous.contains(&key) && !self.current.contains(&key)
    }

    /// Promotes the current snapshot; call once at the end of every iteration.
    pub fn advance(&mut self) {
        self.previous = self.current.clone();
        self.advanced = true;
    }
}
