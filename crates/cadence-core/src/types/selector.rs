//! Clip selection strategies.
//!
//! A selector decides which clip of a cue plays next, given the clip count
//! and the index that played last. `None` going in means the traversal has
//! not started yet; `None` coming out means stop.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{AssetReference, Cue};

/// Strategy for picking the next clip index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// Random index on every call, forever.
    Random,
    /// Walk the clips in order once, then stop.
    Sequential,
    /// Walk the clips in order, wrapping around forever.
    SequentialRepeat,
    /// One random clip, then stop.
    #[default]
    RandomOnce,
    /// Random index on every call, never the one that just played.
    RandomNoRepeat,
}

impl SelectorKind {
    /// Pick the index that follows `current` in a sequence of `len` clips.
    pub fn next_index<R: Rng + ?Sized>(
        self,
        len: usize,
        current: Option<usize>,
        rng: &mut R,
    ) -> Option<usize> {
        if len == 0 {
            return None;
        }

        match self {
            Self::Random => Some(rng.gen_range(0..len)),
            Self::Sequential => match current {
                None => Some(0),
                Some(index) if index >= len - 1 => None,
                Some(index) => Some(index + 1),
            },
            Self::SequentialRepeat => Some(current.map_or(0, |index| (index + 1) % len)),
            Self::RandomOnce => {
                if current.is_some() {
                    None
                } else {
                    Some(rng.gen_range(0..len))
                }
            }
            Self::RandomNoRepeat => {
                if len == 1 {
                    return None;
                }
                match current.filter(|&index| index < len) {
                    // Draw from the other len - 1 slots and skip over the current one.
                    Some(excluded) => {
                        let index = rng.gen_range(0..len - 1);
                        Some(if index >= excluded { index + 1 } else { index })
                    }
                    None => Some(rng.gen_range(0..len)),
                }
            }
        }
    }
}

/// One traversal over a cue's clips.
///
/// Created fresh for every SFX play request; nothing carries over between
/// plays.
#[derive(Debug)]
pub struct ClipSelector<'a> {
    cue: &'a Cue,
    current_index: Option<usize>,
    rng: StdRng,
}

impl<'a> ClipSelector<'a> {
    pub fn new(cue: &'a Cue) -> Self {
        Self::with_rng(cue, StdRng::from_entropy())
    }

    /// Create a traversal with a deterministic random source.
    pub fn seeded(cue: &'a Cue, seed: u64) -> Self {
        Self::with_rng(cue, StdRng::seed_from_u64(seed))
    }

    const fn with_rng(cue: &'a Cue, rng: StdRng) -> Self {
        Self {
            cue,
            current_index: None,
            rng,
        }
    }

    /// Index of the clip most recently returned.
    pub const fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Advance the traversal and return the next clip, or `None` to stop.
    pub fn next_clip(&mut self) -> Option<&'a AssetReference> {
        self.current_index =
            self.cue
                .selector
                .next_index(self.cue.clips.len(), self.current_index, &mut self.rng);
        self.current_index.and_then(|index| self.cue.clips.get(index))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::PlaybackConfig;
    use proptest::prelude::*;

    const ALL: [SelectorKind; 5] = [
        SelectorKind::Random,
        SelectorKind::Sequential,
        SelectorKind::SequentialRepeat,
        SelectorKind::RandomOnce,
        SelectorKind::RandomNoRepeat,
    ];

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn cue(clips: &[&str], selector: SelectorKind) -> Cue {
        Cue::new(
            clips.iter().copied().map(AssetReference::new).collect(),
            PlaybackConfig::default(),
        )
        .with_selector(selector)
    }

    #[test]
    fn test_empty_sequence_stops() {
        let mut rng = rng();
        for kind in ALL {
            assert_eq!(kind.next_index(0, None, &mut rng), None, "{kind:?}");
            assert_eq!(kind.next_index(0, Some(0), &mut rng), None, "{kind:?}");
        }
    }

    #[test]
    fn test_sequential() {
        let mut rng = rng();
        assert_eq!(SelectorKind::Sequential.next_index(3, None, &mut rng), Some(0));
        assert_eq!(SelectorKind::Sequential.next_index(3, Some(0), &mut rng), Some(1));
        assert_eq!(SelectorKind::Sequential.next_index(3, Some(1), &mut rng), Some(2));
        assert_eq!(SelectorKind::Sequential.next_index(3, Some(2), &mut rng), None);
    }

    #[test]
    fn test_sequential_repeat_wraps() {
        let mut rng = rng();
        assert_eq!(SelectorKind::SequentialRepeat.next_index(3, Some(2), &mut rng), Some(0));
        assert_eq!(SelectorKind::SequentialRepeat.next_index(1, Some(0), &mut rng), Some(0));
        assert_eq!(SelectorKind::SequentialRepeat.next_index(1, None, &mut rng), Some(0));
    }

    #[test]
    fn test_random_once_stops_on_second_call() {
        let mut rng = rng();
        let first = SelectorKind::RandomOnce.next_index(4, None, &mut rng);
        assert!(first.is_some_and(|i| i < 4));
        assert_eq!(SelectorKind::RandomOnce.next_index(4, first, &mut rng), None);
    }

    #[test]
    fn test_random_no_repeat_needs_two_clips() {
        let mut rng = rng();
        assert_eq!(SelectorKind::RandomNoRepeat.next_index(1, None, &mut rng), None);
        assert_eq!(SelectorKind::RandomNoRepeat.next_index(1, Some(0), &mut rng), None);
    }

    #[test]
    fn test_random_no_repeat_thousand_trials() {
        let mut rng = rng();
        for _ in 0..1000 {
            let current = rng.gen_range(0..5);
            let next = SelectorKind::RandomNoRepeat
                .next_index(5, Some(current), &mut rng)
                .unwrap();
            assert_ne!(next, current);
            assert!(next < 5);
        }
    }

    #[test]
    fn test_random_never_stops() {
        let mut rng = rng();
        let mut current = None;
        for _ in 0..100 {
            current = SelectorKind::Random.next_index(3, current, &mut rng);
            assert!(current.is_some_and(|i| i < 3));
        }
    }

    #[test]
    fn test_clip_selector_traversal() {
        let cue = cue(&["a", "b"], SelectorKind::Sequential);
        let mut selector = ClipSelector::seeded(&cue, 1);
        assert_eq!(selector.current_index(), None);
        assert_eq!(selector.next_clip().unwrap().key(), "a");
        assert_eq!(selector.next_clip().unwrap().key(), "b");
        assert!(selector.next_clip().is_none());
        assert_eq!(selector.current_index(), None);
    }

    #[test]
    fn test_clip_selector_default_is_random_once() {
        let cue = cue(&["a", "b", "c"], SelectorKind::default());
        let mut selector = ClipSelector::seeded(&cue, 3);
        assert!(selector.next_clip().is_some());
        assert!(selector.next_clip().is_none());
    }

    proptest! {
        #[test]
        fn prop_sequential_advances_by_one(len in 1usize..64, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            for index in 0..len - 1 {
                prop_assert_eq!(SelectorKind::Sequential.next_index(len, Some(index), &mut rng), Some(index + 1));
            }
            prop_assert_eq!(SelectorKind::Sequential.next_index(len, Some(len - 1), &mut rng), None);
        }

        #[test]
        fn prop_sequential_repeat_never_stops(len in 1usize..64, index in 0usize..64, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let index = index % len;
            prop_assert_eq!(
                SelectorKind::SequentialRepeat.next_index(len, Some(index), &mut rng),
                Some((index + 1) % len)
            );
        }

        #[test]
        fn prop_random_no_repeat_excludes_current(len in 2usize..32, index in 0usize..32, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let index = index % len;
            let next = SelectorKind::RandomNoRepeat.next_index(len, Some(index), &mut rng);
            prop_assert!(next.is_some_and(|n| n != index && n < len));
        }

        #[test]
        fn prop_random_stays_in_range(len in 1usize..128, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let next = SelectorKind::Random.next_index(len, None, &mut rng);
            prop_assert!(next.is_some_and(|n| n < len));
        }
    }
}
