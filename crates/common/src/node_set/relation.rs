use serde::{Deserialize, Serialize};

use super::spec::{suffix_under, NodeSetSpec};

/// How two selections over the same AU relate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    /// The first selection covers the second
    Above,
    /// The second selection covers the first
    Below,
    SameLevelOverlap,
    SameLevelNoOverlap,
    NoRelation,
}

impl Relation {
    pub fn inverse(self) -> Self {
        match self {
            Relation::Above => Relation::Below,
            Relation::Below => Relation::Above,
            other => other,
        }
    }
}

/// Relation between two selectors known to be over the same AU
pub fn compare(a: &NodeSetSpec, b: &NodeSetSpec) -> Relation {
    use NodeSetSpec::*;

    match (a, b) {
        (Whole, Whole) => return Relation::SameLevelOverlap,
        (Whole, _) => return Relation::Above,
        (_, Whole) => return Relation::Below,
        _ => {}
    }

    if a.prefix_url() == b.prefix_url() {
        return match (a, b) {
            (Single(_), Single(_)) => Relation::SameLevelOverlap,
            (Single(_), _) | (_, Single(_)) => Relation::SameLevelNoOverlap,
            _ if a.is_disjoint(b) => Relation::SameLevelNoOverlap,
            _ => Relation::SameLevelOverlap,
        };
    }

    if a.subsumes(b) {
        return Relation::Above;
    }
    if b.subsumes(a) {
        return Relation::Below;
    }

    // a single node sitting on an ancestor of the other selection
    //  shares its level but none of its content
    let single_above = |single: &NodeSetSpec, other: &NodeSetSpec| {
        matches!(single, Single(url) if suffix_under(other.prefix_url(), url).is_some())
    };
    if single_above(a, b) || single_above(b, a) {
        return Relation::SameLevelNoOverlap;
    }

    Relation::NoRelation
}
