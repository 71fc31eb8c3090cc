//! Merge-law harness for aggregates.
//!
//! The harness folds trial records into aggregates in different groupings
//! and orders and compares the results. Any [`Aggregate`] that also
//! implements `Clone + PartialEq + Debug` can be checked.
//!
//! # Example
//!
//! ```ignore
//! use wavelab_core::aggregate::SignatureTable;
//! use wavelab_test_utils::laws::check_merge_laws;
//!
//! let result = check_merge_laws::<SignatureTable>(&a, &b, &c);
//! result.assert_lawful();
//! ```

use std::fmt::Debug;

use wavelab_core::aggregate::Aggregate;
use wavelab_core::record::TrialRecord;

/// Fold one record into a fresh accumulator.
pub fn single<T: Aggregate>(record: &TrialRecord) -> T {
    let mut acc = T::default();
    acc.update(record);
    acc
}

/// Fold records sequentially into one accumulator.
pub fn sequential<T: Aggregate>(records: &[&TrialRecord]) -> T {
    let mut acc = T::default();
    for record in records {
        acc.update(record);
    }
    acc
}

fn merged<T: Aggregate>(mut left: T, right: T) -> T {
    left.merge(right);
    left
}

/// Result of checking the merge laws on three records.
#[derive(Debug, Clone)]
pub struct MergeLawResult<T> {
    /// `(A + B) + C`.
    pub left_grouped: T,
    /// `A + (B + C)`.
    pub right_grouped: T,
    /// `B + A`, compared against `A + B`.
    pub swapped: T,
    /// `A + B` by merge.
    pub merged_pair: T,
    /// `A` then `B` updated into one accumulator.
    pub sequential_pair: T,
}

impl<T: PartialEq + Debug> MergeLawResult<T> {
    /// Grouping of merges did not change the result.
    pub fn is_associative(&self) -> bool {
        self.left_grouped == self.right_grouped
    }

    /// Order of merges did not change the result.
    pub fn is_commutative(&self) -> bool {
        self.merged_pair == self.swapped
    }

    /// Merging single-trial accumulators equals updating sequentially.
    pub fn merge_matches_update(&self) -> bool {
        self.merged_pair == self.sequential_pair
    }

    /// Panic with a detailed message if any law is broken.
    pub fn assert_lawful(&self) {
        assert!(
            self.is_associative(),
            "Merge is not associative:\n  (A+B)+C: {:?}\n  A+(B+C): {:?}",
            self.left_grouped,
            self.right_grouped
        );
        assert!(
            self.is_commutative(),
            "Merge is not commutative:\n  A+B: {:?}\n  B+A: {:?}",
            self.merged_pair,
            self.swapped
        );
        assert!(
            self.merge_matches_update(),
            "Merge differs from sequential update:\n  merged:     {:?}\n  sequential: {:?}",
            self.merged_pair,
            self.sequential_pair
        );
    }
}

/// Check associativity, commutativity and merge-versus-update on three
/// independent records.
pub fn check_merge_laws<T>(a: &TrialRecord, b: &TrialRecord, c: &TrialRecord) -> MergeLawResult<T>
where
    T: Aggregate + Clone,
{
    let (sa, sb, sc) = (single::<T>(a), single::<T>(b), single::<T>(c));

    MergeLawResult {
        left_grouped: merged(merged(sa.clone(), sb.clone()), sc.clone()),
        right_grouped: merged(sa.clone(), merged(sb.clone(), sc)),
        swapped: merged(sb.clone(), sa.clone()),
        merged_pair: merged(sa, sb),
        sequential_pair: sequential(&[a, b]),
    }
}

/// Merge per-worker batches the way the harness does and compare against
/// one sequential fold of every record.
pub fn batched_equals_sequential<T>(records: &[TrialRecord], batches: usize) -> bool
where
    T: Aggregate + PartialEq,
{
    let batches = batches.max(1);
    let mut shared = T::default();
    for chunk in records.chunks(records.len().div_ceil(batches).max(1)) {
        let mut local = T::default();
        for record in chunk {
            local.update(record);
        }
        shared.merge(local);
    }

    let all: Vec<&TrialRecord> = records.iter().collect();
    shared == sequential::<T>(&all)
}

/// Proptest strategies for trial records and scenario pieces.
///
/// Records generated together share one shape (same action list, same
/// observation windows) the way records of one compiled round do.
pub mod strategies {
    use proptest::prelude::*;
    use wavelab_core::action::{ActionClass, CardPos};
    use wavelab_core::engine::UnitKind;
    use wavelab_core::record::{OutcomeState, TrialRecord};
    use wavelab_core::scene::Lane;
    use wavelab_core::summon::REQUIRED_TYPES;

    use crate::fixtures::RecordBuilder;

    /// Any outcome state.
    pub fn arb_outcome_state() -> impl Strategy<Value = OutcomeState> {
        prop_oneof![
            Just(OutcomeState::Dead),
            Just(OutcomeState::Hit),
            Just(OutcomeState::Miss),
            Just(OutcomeState::NotBorn),
        ]
    }

    /// Lane on a five-lane lawn.
    pub fn arb_lane() -> impl Strategy<Value = Lane> {
        1u8..=5u8
    }

    /// Any lawn cell.
    pub fn arb_card_pos() -> impl Strategy<Value = CardPos> {
        (arb_lane(), 1u8..=9u8).prop_map(|(lane, column)| CardPos::new(lane, column))
    }

    /// Candidate list of up to `max_len` cells.
    pub fn arb_candidates(max_len: usize) -> impl Strategy<Value = Vec<CardPos>> {
        proptest::collection::vec(arb_card_pos(), 0..max_len)
    }

    /// Heavy unit parameters: lane, wave, spawn tick, lifetime, hit mask,
    /// smashed.
    fn arb_heavy() -> impl Strategy<Value = (Lane, u32, i64, i64, u8, bool)> {
        (
            arb_lane(),
            1u32..=3u32,
            0i64..1500i64,
            0i64..1500i64,
            any::<u8>(),
            any::<bool>(),
        )
    }

    /// Smash trial record over the fixed action ticks `ticks`.
    ///
    /// Even slots are ash actions, odd slots fodder.
    pub fn arb_trial_record(ticks: Vec<i64>) -> impl Strategy<Value = TrialRecord> {
        proptest::collection::vec(arb_heavy(), 0..6).prop_map(move |heavies| {
            let mut builder = RecordBuilder::new();
            for (slot, &tick) in ticks.iter().enumerate() {
                let class = if slot % 2 == 0 {
                    ActionClass::Ash
                } else {
                    ActionClass::Fodder
                };
                builder = builder.action(class, tick);
            }
            for (lane, wave, spawn, alive, mask, smashed) in heavies {
                builder = builder.heavy(lane, wave, spawn, alive);
                for slot in (0..ticks.len()).filter(|slot| mask & (1 << (slot % 8)) != 0) {
                    builder = builder.hit(slot);
                }
                if smashed {
                    builder = builder.smashed();
                }
            }
            builder.build()
        })
    }

    /// Explode trial record with `waves` observed windows of `ticks` entries.
    pub fn arb_loss_record(waves: usize, ticks: usize) -> impl Strategy<Value = TrialRecord> {
        proptest::collection::vec(proptest::collection::vec(0i64..4000i64, ticks), waves).prop_map(
            |series| {
                let mut builder = RecordBuilder::new();
                for (idx, losses) in series.iter().enumerate() {
                    builder = builder.losses(idx as u32 + 1, 400, losses);
                }
                builder.build()
            },
        )
    }

    /// Any optional summon kind.
    fn arb_optional_kind() -> impl Strategy<Value = UnitKind> {
        prop_oneof![
            Just(UnitKind::Ladder),
            Just(UnitKind::JackInTheBox),
            Just(UnitKind::Football),
            Just(UnitKind::Catapult),
        ]
    }

    /// Refresh trial record over `waves` waves; some checks may be missing.
    pub fn arb_refresh_record(waves: u32) -> impl Strategy<Value = TrialRecord> {
        (
            proptest::collection::vec(arb_optional_kind(), 0..=2),
            proptest::collection::vec((1i64..6000i64, proptest::option::of(0u32..=100u32)), waves as usize),
        )
            .prop_map(|(optional, samples)| {
                let kinds: Vec<UnitKind> = REQUIRED_TYPES.into_iter().chain(optional).collect();
                let mut builder = RecordBuilder::new().spawn_types(&kinds);
                for (wave, (init_hp, percent)) in (1u32..).zip(samples) {
                    let current = percent.map(|percent| init_hp * i64::from(percent) / 100);
                    builder = builder.refresh(wave, init_hp, current);
                }
                builder.build()
            })
    }
}
