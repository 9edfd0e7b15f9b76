use serde::{Deserialize, Serialize};

use crate::store::path;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeSetError {
    #[error("range lower bound {lower:?} is greater than upper bound {upper:?}")]
    InvertedBounds { lower: String, upper: String },
    #[error("range upper bound must not be empty")]
    EmptyUpperBound,
}

/// Selector over a sub-range of an AU's node tree
///
/// Range bounds are compared lexicographically against the part of a
/// url that follows the prefix, separator included: under prefix
/// `http://h/d` the url `http://h/d/leaf1` has suffix `/leaf1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeSetSpec {
    Whole,
    Range {
        prefix: String,
        lower: Option<String>,
        upper: Option<String>,
    },
    Single(String),
}

/// Suffix of `url` below `prefix`, including the leading `/` or `!/`
pub(crate) fn suffix_under<'a>(url: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = url.strip_prefix(prefix)?;
    if rest.starts_with('/') || rest.starts_with("!/") {
        Some(rest)
    } else {
        None
    }
}

impl NodeSetSpec {
    pub fn whole() -> Self {
        NodeSetSpec::Whole
    }

    pub fn single(url: &str) -> Self {
        NodeSetSpec::Single(path::normalize(url))
    }

    /// Unbounded range: the prefix node and everything below it
    pub fn prefix(prefix: &str) -> Self {
        NodeSetSpec::Range {
            prefix: path::normalize(prefix),
            lower: None,
            upper: None,
        }
    }

    pub fn range(
        prefix: &str,
        lower: Option<&str>,
        upper: Option<&str>,
    ) -> Result<Self, NodeSetError> {
        if upper == Some("") {
            return Err(NodeSetError::EmptyUpperBound);
        }
        if let (Some(lo), Some(hi)) = (lower, upper) {
            if lo > hi {
                return Err(NodeSetError::InvertedBounds {
                    lower: lo.to_string(),
                    upper: hi.to_string(),
                });
            }
        }
        Ok(NodeSetSpec::Range {
            prefix: path::normalize(prefix),
            lower: lower.map(str::to_string),
            upper: upper.map(str::to_string),
        })
    }

    /// Url the selection is rooted at; the AU root is `""`
    pub fn prefix_url(&self) -> &str {
        match self {
            NodeSetSpec::Whole => "",
            NodeSetSpec::Range { prefix, .. } => prefix,
            NodeSetSpec::Single(url) => url,
        }
    }

    /// A range with at least one bound. Bounded ranges exclude
    ///  their prefix node.
    pub fn is_bounded(&self) -> bool {
        matches!(
            self,
            NodeSetSpec::Range { lower, upper, .. } if lower.is_some() || upper.is_some()
        )
    }

    fn in_bounds(lower: &Option<String>, upper: &Option<String>, suffix: &str) -> bool {
        lower.as_deref().map_or(true, |lo| suffix >= lo)
            && upper.as_deref().map_or(true, |hi| suffix <= hi)
    }

    /// Whether the canonical url `url` is selected
    pub fn matches(&self, url: &str) -> bool {
        match self {
            NodeSetSpec::Whole => true,
            NodeSetSpec::Single(single) => single == url,
            NodeSetSpec::Range {
                prefix,
                lower,
                upper,
            } => {
                if url == prefix {
                    return !self.is_bounded();
                }
                suffix_under(url, prefix)
                    .map(|suffix| Self::in_bounds(lower, upper, suffix))
                    .unwrap_or(false)
            }
        }
    }

    /// Whether every url selected by `other` is also selected by `self`
    pub fn subsumes(&self, other: &NodeSetSpec) -> bool {
        match (self, other) {
            (NodeSetSpec::Whole, _) => true,
            (_, NodeSetSpec::Whole) => false,
            (NodeSetSpec::Single(a), NodeSetSpec::Single(b)) => a == b,
            (NodeSetSpec::Single(_), NodeSetSpec::Range { .. }) => false,
            (NodeSetSpec::Range { .. }, NodeSetSpec::Single(url)) => self.matches(url),
            (
                NodeSetSpec::Range {
                    prefix: p,
                    lower: lo,
                    upper: hi,
                },
                NodeSetSpec::Range {
                    prefix: q,
                    lower: lo2,
                    upper: hi2,
                },
            ) => {
                if p == q {
                    let lower_ok = match (lo, lo2) {
                        (None, _) => true,
                        (Some(_), None) => false,
                        (Some(a), Some(b)) => b >= a,
                    };
                    let upper_ok = match (hi, hi2) {
                        (None, _) => true,
                        (Some(_), None) => false,
                        (Some(a), Some(b)) => b <= a,
                    };
                    // an unbounded range selects its prefix node,
                    //  which no bounded range does
                    let prefix_ok = self.is_bounded() <= other.is_bounded();
                    return lower_ok && upper_ok && prefix_ok;
                }
                match suffix_under(q, p) {
                    // every url under q is s followed by nothing, `/...`
                    //  or `!/...`; all of those must sit inside [lo, hi]
                    Some(s) => {
                        lo.as_deref().map_or(true, |lo| s >= lo)
                            && hi
                                .as_deref()
                                .map_or(true, |hi| s < hi && !hi.starts_with(s))
                    }
                    None => false,
                }
            }
        }
    }

    /// Whether no url can be selected by both
    pub fn is_disjoint(&self, other: &NodeSetSpec) -> bool {
        match (self, other) {
            (NodeSetSpec::Whole, _) | (_, NodeSetSpec::Whole) => false,
            (NodeSetSpec::Single(url), spec) | (spec, NodeSetSpec::Single(url)) => {
                !spec.matches(url)
            }
            (
                NodeSetSpec::Range {
                    prefix: p,
                    lower: lo1,
                    upper: hi1,
                },
                NodeSetSpec::Range {
                    prefix: q,
                    lower: lo2,
                    upper: hi2,
                },
            ) => {
                if p == q {
                    let below = |hi: &Option<String>, lo: &Option<String>| match (hi, lo) {
                        (Some(hi), Some(lo)) => hi < lo,
                        _ => false,
                    };
                    return below(hi1, lo2) || below(hi2, lo1);
                }
                let outside = |s: &str, lo: &Option<String>, hi: &Option<String>| {
                    hi.as_deref().is_some_and(|hi| hi < s)
                        || lo.as_deref().is_some_and(|lo| lo > s && !lo.starts_with(s))
                };
                if let Some(s) = suffix_under(q, p) {
                    outside(s, lo1, hi1)
                } else if let Some(s) = suffix_under(p, q) {
                    outside(s, lo2, hi2)
                } else {
                    true
                }
            }
        }
    }
}
