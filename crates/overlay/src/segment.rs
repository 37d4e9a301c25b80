//! Grouping of audit findings by the element they affect.

use std::collections::HashSet;

use axemode_core_types::{TargetSelector, Violation};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TargetViolations {
    pub target: TargetSelector,
    pub violations: Vec<Violation>,
}

/// Ordered `selector -> violations` mapping; key order is first-discovery order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ViolationsByTarget {
    entries: Vec<TargetViolations>,
}

impl ViolationsByTarget {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TargetSelector> {
        self.entries.iter().map(|entry| &entry.target)
    }

    pub fn get(&self, target: &TargetSelector) -> Option<&[Violation]> {
        self.entries
            .iter()
            .find(|entry| &entry.target == target)
            .map(|entry| entry.violations.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetViolations> {
        self.entries.iter()
    }
}

impl IntoIterator for ViolationsByTarget {
    type Item = TargetViolations;
    type IntoIter = std::vec::IntoIter<TargetViolations>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Groups violations by target selector.
///
/// Selectors are keyed in the order they are first met scanning violations, then their
/// affected nodes, then each node's target list. A violation belongs to a selector when any
/// of its nodes lists that selector; violations without nodes have nothing to anchor to and
/// are dropped.
pub fn segment(violations: &[Violation]) -> ViolationsByTarget {
    let mut seen: HashSet<&TargetSelector> = HashSet::new();
    let mut keys: Vec<&TargetSelector> = Vec::new();
    for violation in violations {
        for node in &violation.nodes {
            for target in &node.target {
                if seen.insert(target) {
                    keys.push(target);
                }
            }
        }
    }

    let entries = keys
        .into_iter()
        .map(|target| TargetViolations {
            target: target.clone(),
            violations: violations
                .iter()
                .filter(|violation| violation.affects(target))
                .cloned()
                .collect(),
        })
        .collect();

    ViolationsByTarget { entries }
}
