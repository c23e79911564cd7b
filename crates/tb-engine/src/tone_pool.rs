//! TonePool: tone allocation and recycling.
//!
//! Every instrument borrows tones from one shared pool. The pool is filled
//! up front for the loaded song, so checking a tone out during playback
//! only moves it between the spare list and the slot map.

use alloc::vec::Vec;
use slotmap::{new_key_type, SlotMap};

use crate::tone::Tone;

new_key_type! {
    /// Handle of a tone checked out of the pool.
    pub struct ToneKey;
}

pub struct TonePool {
    tones: SlotMap<ToneKey, Tone>,
    spare: Vec<Tone>,
}

impl TonePool {
    /// A pool with `capacity` tones ready to hand out.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut spare = Vec::with_capacity(capacity);
        spare.extend((0..capacity).map(|_| Tone::new()));
        Self { tones: SlotMap::with_capacity_and_key(capacity), spare }
    }

    /// Take a reset tone. Allocates only when more tones are in use than
    /// the pool was sized for.
    pub fn checkout(&mut self) -> ToneKey {
        let tone = match self.spare.pop() {
            Some(mut tone) => {
                tone.reset();
                tone
            }
            None => Tone::new(),
        };
        self.tones.insert(tone)
    }

    /// Return a tone to the spare list.
    pub fn release(&mut self, key: ToneKey) {
        if let Some(tone) = self.tones.remove(key) {
            self.spare.push(tone);
        }
    }

    pub fn get(&self, key: ToneKey) -> Option<&Tone> {
        self.tones.get(key)
    }

    pub fn get_mut(&mut self, key: ToneKey) -> Option<&mut Tone> {
        self.tones.get_mut(key)
    }

    /// Tones currently checked out.
    pub fn active_count(&self) -> usize {
        self.tones.len()
    }

    /// Tones ready to hand out without allocating.
    pub fn spare_count(&self) -> usize {
        self.spare.len()
    }

    /// Make sure at least `capacity` tones exist in total, adding spares as
    /// needed. Allocates; call between blocks.
    pub fn grow_to(&mut self, capacity: usize) {
        let total = self.tones.len() + self.spare.len();
        if total >= capacity {
            return;
        }
        self.spare.extend((total..capacity).map(|_| Tone::new()));
        self.tones.reserve(capacity.saturating_sub(self.tones.len()));
    }

    /// Size every spare tone's string delay lines for periods up to
    /// `samples`, so plucking never allocates during playback.
    pub fn reserve_strings(&mut self, samples: usize) {
        for tone in self.spare.iter_mut() {
            for string in tone.strings.iter_mut() {
                string.ensure_length(samples);
            }
        }
    }

    /// Return every checked-out tone.
    pub fn release_all(&mut self) {
        for (_, tone) in self.tones.drain() {
            self.spare.push(tone);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::ToneState;

    #[test]
    fn pool_new_has_spares() {
        let pool = TonePool::with_capacity(4);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.spare_count(), 4);
    }

    #[test]
    fn pool_checkout_returns_distinct_keys() {
        let mut pool = TonePool::with_capacity(4);
        let a = pool.checkout();
        let b = pool.checkout();
        assert_ne!(a, b);
        assert_eq!(pool.active_count(), 2);
        assert_eq!(pool.spare_count(), 2);
    }

    #[test]
    fn pool_release_recycles_and_resets() {
        let mut pool = TonePool::with_capacity(1);
        let key = pool.checkout();
        pool.get_mut(key).unwrap().state = ToneState::Released;
        pool.release(key);
        assert!(pool.get(key).is_none());
        let again = pool.checkout();
        assert_eq!(pool.get(again).unwrap().state, ToneState::Active);
    }

    #[test]
    fn pool_grows_past_capacity() {
        let mut pool = TonePool::with_capacity(1);
        pool.checkout();
        pool.checkout();
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn pool_reserved_strings_survive_checkout() {
        let mut pool = TonePool::with_capacity(2);
        pool.reserve_strings(1000);
        let key = pool.checkout();
        assert_eq!(pool.get(key).unwrap().strings[1].buffer.len(), 1024);
    }

    #[test]
    fn pool_grow_counts_checked_out_tones() {
        let mut pool = TonePool::with_capacity(2);
        pool.checkout();
        pool.grow_to(5);
        assert_eq!(pool.spare_count(), 4);
        pool.grow_to(3);
        assert_eq!(pool.spare_count(), 4);
    }

    #[test]
    fn pool_release_all_returns_everything() {
        let mut pool = TonePool::with_capacity(3);
        for _ in 0..3 {
            pool.checkout();
        }
        pool.release_all();
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.spare_count(), 3);
    }
}
