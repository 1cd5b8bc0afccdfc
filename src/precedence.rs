use std::cmp::{Ordering, Reverse};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::debug;

use crate::feature::{FeatureId, FeatureState, Priority, Scope};

/// Compares two states of the same feature. `Ordering::Greater` means `a` takes precedence over
/// `b`.
///
/// Identity overrides outrank segment overrides, which outrank the environment default. Segment
/// overrides rank by ascending priority. Within one rank a state of a more recently live version
/// wins over an older one, and any versioned state wins over a legacy one.
pub fn compare_precedence(a: &FeatureState, b: &FeatureState) -> Ordering {
    scope_rank(a)
        .cmp(&scope_rank(b))
        .then_with(|| version_rank(a).cmp(&version_rank(b)))
}

fn scope_rank(feature_state: &FeatureState) -> (u8, Reverse<Priority>) {
    match feature_state.scope() {
        Scope::Identity(_) => (2, Reverse(0)),
        Scope::Segment { priority } => (1, Reverse(priority)),
        Scope::Environment => (0, Reverse(0)),
    }
}

fn version_rank(feature_state: &FeatureState) -> Option<Option<DateTime<Utc>>> {
    feature_state.version.as_ref().map(|version| version.live_from)
}

/// Keeps the single live state with the highest precedence for every feature.
///
/// States of unpublished versions, or of versions that only go live after `now`, are skipped.
/// When two states compare equal the one seen last wins. Features keep the position at which
/// they were first seen.
pub fn prioritised_feature_states<I>(feature_states: I, now: DateTime<Utc>) -> Vec<FeatureState>
where
    I: IntoIterator<Item = FeatureState>,
{
    let mut prioritised: Vec<FeatureState> = Vec::new();
    let mut position_by_feature: HashMap<FeatureId, usize> = HashMap::new();

    for feature_state in feature_states {
        if !feature_state.is_live_at(now) {
            debug!(
                "skipping feature state {} of feature {}: version is not live",
                feature_state.id, feature_state.feature.id
            );
            continue;
        }

        match position_by_feature.entry(feature_state.feature.id) {
            Entry::Occupied(entry) => {
                let existing = &mut prioritised[*entry.get()];
                if compare_precedence(existing, &feature_state) != Ordering::Greater {
                    *existing = feature_state;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(prioritised.len());
                prioritised.push(feature_state);
            }
        }
    }

    prioritised
}

#[cfg(test)]
pub(crate) mod proptest_generators {
    use crate::feature::FeatureState;
    use crate::test_common::{environment_default, feature, identity_override, segment_override};
    use proptest::prelude::*;

    prop_compose! {
        // Segment overrides of one feature with pairwise distinct priorities, in random order.
        pub(crate) fn any_segment_overrides()(
            priorities in prop::collection::hash_set(0u32..1000, 1..8)
        )(
            shuffled in Just(priorities.into_iter().collect::<Vec<_>>()).prop_shuffle()
        ) -> Vec<FeatureState> {
            shuffled
                .into_iter()
                .enumerate()
                .map(|(i, priority)| {
                    segment_override(100 + i as i64, feature(1, "dark_mode"), i as i64, priority, true)
                })
                .collect()
        }
    }

    prop_compose! {
        // One identity override, one environment default and some segment overrides of the same
        // feature, in random order.
        pub(crate) fn any_mixed_scopes()(overrides in any_segment_overrides())(
            shuffled in Just({
                let mut states = overrides;
                states.push(identity_override(1, feature(1, "dark_mode"), 42, true));
                states.push(environment_default(2, feature(1, "dark_mode"), false));
                states
            }).prop_shuffle()
        ) -> Vec<FeatureState> {
            shuffled
        }
    }
}
