//! Account roster sequencing
//!
//! Rosters may mark flat spans whose accounts run in a random order. Unlike
//! task blocks, spans never nest.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Imbalance, ResolveError, ResolveResult};

/// Roster line: an item or a span marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterEntry<T> {
    #[serde(rename = "account")]
    Item(T),
    BeginRandom,
    EndRandom,
}

/// Replace every random span with a shuffled copy of its content
pub fn sequence<T, R: Rng + ?Sized>(
    mut entries: Vec<RosterEntry<T>>,
    rng: &mut R,
) -> ResolveResult<Vec<T>> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut open: Option<usize> = None;

    for (position, entry) in entries.iter().enumerate() {
        match entry {
            RosterEntry::Item(_) => {}
            RosterEntry::BeginRandom => {
                if open.is_some() {
                    return Err(ResolveError::UnbalancedGroup {
                        position,
                        kind: Imbalance::NestedBegin,
                    });
                }
                open = Some(position);
            }
            RosterEntry::EndRandom => {
                let start = open.take().ok_or(ResolveError::UnbalancedGroup {
                    position,
                    kind: Imbalance::DanglingEnd,
                })?;
                spans.push((start, position));
            }
        }
    }

    if let Some(position) = open {
        return Err(ResolveError::UnbalancedGroup {
            position,
            kind: Imbalance::Unterminated,
        });
    }

    // Last span first so earlier indices stay valid
    for (start, end) in spans.into_iter().rev() {
        let mut content: Vec<RosterEntry<T>> = entries
            .drain(start..=end)
            .filter(|entry| matches!(entry, RosterEntry::Item(_)))
            .collect();
        content.shuffle(rng);
        entries.splice(start..start, content);
    }

    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            RosterEntry::Item(item) => Some(item),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::RosterEntry::{BeginRandom, EndRandom, Item};

    #[test]
    fn test_span_is_permuted_in_place() {
        let roster = vec![Item(0), BeginRandom, Item(1), Item(2), Item(3), EndRandom, Item(4)];
        let mut seen_reordered = false;

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let order = sequence(roster.clone(), &mut rng).unwrap();
            assert_eq!(order.len(), 5);
            assert_eq!(order[0], 0);
            assert_eq!(order[4], 4);

            let mut middle = order[1..4].to_vec();
            if middle != vec![1, 2, 3] {
                seen_reordered = true;
            }
            middle.sort();
            assert_eq!(middle, vec![1, 2, 3]);
        }
        assert!(seen_reordered);
    }

    #[test]
    fn test_empty_span_is_removed() {
        let roster = vec![Item("a"), BeginRandom, EndRandom, Item("b")];
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sequence(roster, &mut rng).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_several_spans() {
        let roster = vec![BeginRandom, Item(1), Item(2), EndRandom, Item(3), BeginRandom, Item(4), Item(5), EndRandom];
        let mut rng = StdRng::seed_from_u64(9);
        let order = sequence(roster, &mut rng).unwrap();
        assert_eq!(order.len(), 5);
        assert_eq!(order[2], 3);
        assert!(order[..2].contains(&1) && order[..2].contains(&2));
        assert!(order[3..].contains(&4) && order[3..].contains(&5));
    }

    #[test]
    fn test_unbalanced_markers_are_fatal() {
        let mut rng = StdRng::seed_from_u64(1);

        let nested = vec![BeginRandom, Item(1), BeginRandom, EndRandom];
        assert_eq!(
            sequence(nested, &mut rng).unwrap_err(),
            ResolveError::UnbalancedGroup { position: 2, kind: Imbalance::NestedBegin }
        );

        let dangling = vec![Item(1), EndRandom];
        assert_eq!(
            sequence(dangling, &mut rng).unwrap_err(),
            ResolveError::UnbalancedGroup { position: 1, kind: Imbalance::DanglingEnd }
        );

        let unterminated = vec![Item(1), BeginRandom, Item(2)];
        assert_eq!(
            sequence(unterminated, &mut rng).unwrap_err(),
            ResolveError::UnbalancedGroup { position: 1, kind: Imbalance::Unterminated }
        );
    }
}
