// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Individual QoS policies used by the Shapes exerciser.
//!
//! Kinds that participate in requested-vs-offered (RxO) matching derive `Ord`
//! so that "offered is at least as strong as requested" reads as `offered >= requested`.

use std::fmt;

/// RELIABILITY kind. `BestEffort < Reliable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ReliabilityKind {
    #[default]
    BestEffort,
    Reliable,
}

/// DURABILITY kind, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DurabilityKind {
    #[default]
    Volatile,
    TransientLocal,
    Transient,
    Persistent,
}

impl DurabilityKind {
    /// Whether late-joining readers receive previously written samples.
    pub fn retains_history(self) -> bool {
        self >= DurabilityKind::TransientLocal
    }
}

impl fmt::Display for DurabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DurabilityKind::Volatile => "VOLATILE",
            DurabilityKind::TransientLocal => "TRANSIENT_LOCAL",
            DurabilityKind::Transient => "TRANSIENT",
            DurabilityKind::Persistent => "PERSISTENT",
        };
        f.write_str(name)
    }
}

/// HISTORY policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum History {
    /// Keep the most recent `depth` samples per instance. `depth` is never 0.
    KeepLast(u32),
    /// Keep every sample until taken.
    KeepAll,
}

impl Default for History {
    fn default() -> Self {
        History::KeepLast(1)
    }
}

impl History {
    /// Per-instance sample limit, `None` for KEEP_ALL.
    pub fn depth(self) -> Option<usize> {
        match self {
            History::KeepLast(depth) => Some(depth.max(1) as usize),
            History::KeepAll => None,
        }
    }
}

/// OWNERSHIP kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnershipKind {
    /// Every writer may update every instance.
    #[default]
    Shared,
    /// Only the strongest live writer updates an instance.
    Exclusive,
}

/// OWNERSHIP policy as offered by a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ownership {
    pub kind: OwnershipKind,
    /// OWNERSHIP_STRENGTH, only meaningful with [`OwnershipKind::Exclusive`].
    pub strength: i32,
}

impl Ownership {
    pub fn shared() -> Self {
        Self::default()
    }

    pub fn exclusive(strength: i32) -> Self {
        Self {
            kind: OwnershipKind::Exclusive,
            strength,
        }
    }
}

/// PARTITION policy.
///
/// An empty list is the default partition. Names may contain `*` and `?`
/// wildcards; two lists match when any pair of names matches in either
/// direction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    pub names: Vec<String>,
}

impl Partition {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn single(name: &str) -> Self {
        Self {
            names: vec![name.to_string()],
        }
    }

    pub fn is_default(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether a publisher in `self` and a subscriber in `other` can communicate.
    ///
    /// The default partition behaves as the single name `""`.
    pub fn matches(&self, other: &Partition) -> bool {
        let default = [String::new()];
        let ours: &[String] = if self.is_default() { &default } else { &self.names };
        let theirs: &[String] = if other.is_default() { &default } else { &other.names };

        ours.iter().any(|a| {
            theirs
                .iter()
                .any(|b| a == b || wildcard_match(a, b) || wildcard_match(b, a))
        })
    }
}

/// Glob-style match of `text` against `pattern` (`*` any run, `?` one char).
pub(crate) fn wildcard_match(pattern: &str, text: &str) -> bool {
    fn matches(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (None, Some(_)) => false,
            (Some('*'), _) => {
                matches(&pattern[1..], text) || (!text.is_empty() && matches(pattern, &text[1..]))
            }
            (Some(_), None) => false,
            (Some('?'), Some(_)) => matches(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) => p == t && matches(&pattern[1..], &text[1..]),
        }
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    matches(&pattern, &text)
}

/// PRESENTATION access scope, ordered from narrowest to widest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PresentationAccessScope {
    #[default]
    Instance,
    Topic,
    Group,
}

/// PRESENTATION policy, set on publishers and subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Presentation {
    pub access_scope: PresentationAccessScope,
    pub coherent_access: bool,
    pub ordered_access: bool,
}

impl Presentation {
    /// Whether a writer offering `self` satisfies a reader requesting `requested`.
    pub fn is_compatible_with(&self, requested: &Presentation) -> bool {
        self.access_scope >= requested.access_scope
            && (self.coherent_access || !requested.coherent_access)
            && (self.ordered_access || !requested.ordered_access)
    }

    /// Whether coherent sets or ordered access are in use.
    pub fn is_grouped(&self) -> bool {
        self.coherent_access || self.ordered_access
    }
}

/// DATA_REPRESENTATION. Writers and readers must agree exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataRepresentation {
    #[default]
    Xcdr,
    Xcdr2,
}

impl fmt::Display for DataRepresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataRepresentation::Xcdr => f.write_str("XCDR"),
            DataRepresentation::Xcdr2 => f.write_str("XCDR2"),
        }
    }
}

/// WRITER_DATA_LIFECYCLE policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterDataLifecycle {
    /// Dispose instances when they are unregistered.
    pub autodispose_unregistered_instances: bool,
}

impl Default for WriterDataLifecycle {
    fn default() -> Self {
        Self {
            autodispose_unregistered_instances: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ordering() {
        assert!(ReliabilityKind::Reliable > ReliabilityKind::BestEffort);
        assert!(DurabilityKind::Persistent > DurabilityKind::TransientLocal);
        assert!(!DurabilityKind::Volatile.retains_history());
        assert!(DurabilityKind::Transient.retains_history());
    }

    #[test]
    fn test_history_depth() {
        assert_eq!(History::default().depth(), Some(1));
        assert_eq!(History::KeepLast(5).depth(), Some(5));
        assert_eq!(History::KeepAll.depth(), None);
    }

    #[test]
    fn test_default_partitions_match() {
        assert!(Partition::default().matches(&Partition::default()));
        assert!(!Partition::default().matches(&Partition::single("p1")));
    }

    #[test]
    fn test_partition_wildcard_either_side() {
        assert!(Partition::single("p*").matches(&Partition::single("p1")));
        assert!(Partition::single("p1").matches(&Partition::single("p*")));
        assert!(Partition::single("p?").matches(&Partition::single("p2")));
        assert!(!Partition::single("p?").matches(&Partition::single("p22")));
        assert!(!Partition::single("q*").matches(&Partition::single("p1")));
    }

    #[test]
    fn test_partition_lists_intersect() {
        let a = Partition::new(vec!["a".into(), "b".into()]);
        assert!(a.matches(&Partition::single("b")));
        assert!(!a.matches(&Partition::single("c")));
    }

    #[test]
    fn test_presentation_compat() {
        let offered = Presentation {
            access_scope: PresentationAccessScope::Topic,
            coherent_access: true,
            ordered_access: false,
        };
        let mut requested = Presentation {
            access_scope: PresentationAccessScope::Instance,
            coherent_access: true,
            ordered_access: false,
        };
        assert!(offered.is_compatible_with(&requested));
        requested.access_scope = PresentationAccessScope::Group;
        assert!(!offered.is_compatible_with(&requested));
        requested.access_scope = PresentationAccessScope::Topic;
        requested.ordered_access = true;
        assert!(!offered.is_compatible_with(&requested));
    }
}
