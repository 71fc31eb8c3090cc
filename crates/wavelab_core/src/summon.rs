//! Random wave compositions for refresh scenarios.
//!
//! A refresh trial first draws the set of unit kinds its waves may contain
//! ([`SpawnTypes::draw`]), then fills every wave with [`WAVE_SIZE`] units
//! picked from that set by weight ([`SpawnTypes::spawn_list`]).

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::UnitKind;

/// Units summoned per wave.
pub const WAVE_SIZE: usize = 50;

/// Kinds present in every drawn set.
pub const REQUIRED_TYPES: [UnitKind; 3] = [
    UnitKind::Regular,
    UnitKind::Gargantuar,
    UnitKind::GigaGargantuar,
];

/// Optional kinds; `None` entries are blank draws.
const OPTIONAL_TYPES: [Option<UnitKind>; 6] = [
    Some(UnitKind::Ladder),
    Some(UnitKind::JackInTheBox),
    Some(UnitKind::Football),
    Some(UnitKind::Catapult),
    None,
    None,
];

/// Optional draws per set, without replacement.
const OPTIONAL_DRAWS: usize = 2;

/// Relative summon weight of a unit kind in a regular wave.
#[must_use]
pub const fn summon_weight(kind: UnitKind) -> u32 {
    match kind {
        UnitKind::Regular => 400,
        UnitKind::Gargantuar | UnitKind::Catapult => 1500,
        UnitKind::GigaGargantuar | UnitKind::Ladder | UnitKind::JackInTheBox => 1000,
        UnitKind::Football => 2000,
    }
}

/// Sorted, duplicate-free set of unit kinds a trial summons from.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SpawnTypes(Vec<UnitKind>);

impl SpawnTypes {
    /// Build a set from any kinds.
    #[must_use]
    pub fn new(kinds: impl IntoIterator<Item = UnitKind>) -> Self {
        let mut kinds: Vec<UnitKind> = kinds.into_iter().collect();
        kinds.sort_unstable();
        kinds.dedup();
        Self(kinds)
    }

    /// Draw a set: every required kind plus a few optional ones.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let optional = OPTIONAL_TYPES
            .choose_multiple(rng, OPTIONAL_DRAWS)
            .filter_map(|kind| *kind);
        Self::new(REQUIRED_TYPES.into_iter().chain(optional))
    }

    /// Kinds in the set, sorted.
    #[must_use]
    pub fn kinds(&self) -> &[UnitKind] {
        &self.0
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if a kind is in the set.
    #[must_use]
    pub fn contains(&self, kind: UnitKind) -> bool {
        self.0.binary_search(&kind).is_ok()
    }

    /// Draw one wave's worth of units. An empty set summons nothing.
    pub fn spawn_list<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<UnitKind> {
        let Ok(dist) = WeightedIndex::new(self.0.iter().map(|&kind| summon_weight(kind))) else {
            return Vec::new();
        };
        (0..WAVE_SIZE).map(|_| self.0[dist.sample(rng)]).collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_draw_keeps_required_kinds() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..50 {
            let types = SpawnTypes::draw(&mut rng);
            assert!(REQUIRED_TYPES.iter().all(|&kind| types.contains(kind)));
            assert!(types.kinds().len() <= REQUIRED_TYPES.len() + OPTIONAL_DRAWS);
            assert!(types.kinds().windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn test_new_sorts_and_dedups() {
        let types = SpawnTypes::new([UnitKind::Football, UnitKind::Regular, UnitKind::Football]);
        assert_eq!(types.kinds(), &[UnitKind::Regular, UnitKind::Football]);
    }

    #[test]
    fn test_spawn_list_uses_only_set_kinds() {
        let types = SpawnTypes::new([UnitKind::Regular, UnitKind::GigaGargantuar]);
        let list = types.spawn_list(&mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(list.len(), WAVE_SIZE);
        assert!(list.iter().all(|&kind| types.contains(kind)));
    }

    #[test]
    fn test_spawn_list_is_seed_deterministic() {
        let types = SpawnTypes::new(REQUIRED_TYPES);
        let a = types.spawn_list(&mut ChaCha8Rng::seed_from_u64(1));
        let b = types.spawn_list(&mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_set_summons_nothing() {
        let list = SpawnTypes::default().spawn_list(&mut ChaCha8Rng::seed_from_u64(0));
        assert!(list.is_empty());
    }
}
