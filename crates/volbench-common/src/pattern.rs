//! The closed set of benchmark pattern identifiers.
//!
//! Patterns are a fixed vocabulary. Historical identifiers from earlier
//! releases are accepted at the API boundary through [`PatternId::resolve`]
//! and mapped to their canonical form there; nothing downstream ever sees
//! an alias.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical benchmark pattern identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternId {
    /// Short sanity pass, sized for a single stream.
    #[serde(rename = "quick")]
    Quick,
    /// One sustained 4K production stream.
    #[serde(rename = "stream-1")]
    Stream1,
    /// Four concurrent 4K production streams.
    #[serde(rename = "stream-4")]
    Stream4,
    /// Eight concurrent 4K production streams.
    #[serde(rename = "stream-8")]
    Stream8,
    /// Long sustained two-stream pass for thermal and cache falloff.
    #[serde(rename = "endurance")]
    Endurance,
}

/// Legacy identifier aliases kept for older frontends and saved links.
const ALIASES: &[(&str, PatternId)] = &[
    ("basic", PatternId::Quick),
    ("quicktest", PatternId::Quick),
    ("single", PatternId::Stream1),
    ("single-stream", PatternId::Stream1),
    ("multi", PatternId::Stream4),
    ("multi-stream", PatternId::Stream4),
    ("full", PatternId::Endurance),
    ("soak", PatternId::Endurance),
];

impl PatternId {
    /// All canonical patterns, in display order.
    pub fn all() -> &'static [PatternId] {
        &[
            PatternId::Quick,
            PatternId::Stream1,
            PatternId::Stream4,
            PatternId::Stream8,
            PatternId::Endurance,
        ]
    }

    /// Canonical string form, as used on the wire and in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternId::Quick => "quick",
            PatternId::Stream1 => "stream-1",
            PatternId::Stream4 => "stream-4",
            PatternId::Stream8 => "stream-8",
            PatternId::Endurance => "endurance",
        }
    }

    /// Resolve a user-supplied identifier, accepting canonical names and
    /// legacy aliases. Matching is case-insensitive.
    pub fn resolve(input: &str) -> Option<PatternId> {
        let normalized = input.trim().to_ascii_lowercase();
        if let Some(id) = Self::all().iter().find(|p| p.as_str() == normalized) {
            return Some(*id);
        }
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, id)| *id)
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_round_trip() {
        for p in PatternId::all() {
            assert_eq!(PatternId::resolve(p.as_str()), Some(*p));
        }
    }

    #[test]
    fn test_aliases_resolve() {
        assert_eq!(PatternId::resolve("single"), Some(PatternId::Stream1));
        assert_eq!(PatternId::resolve("MULTI"), Some(PatternId::Stream4));
        assert_eq!(PatternId::resolve("  full "), Some(PatternId::Endurance));
    }

    #[test]
    fn test_unknown_rejected() {
        assert_eq!(PatternId::resolve("turbo"), None);
        assert_eq!(PatternId::resolve(""), None);
    }

    #[test]
    fn test_serde_uses_canonical_form() {
        let json = serde_json::to_string(&PatternId::Stream4).unwrap();
        assert_eq!(json, "\"stream-4\"");
    }
}
