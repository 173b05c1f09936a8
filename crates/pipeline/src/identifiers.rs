//! Typed names and run identifiers.
//!
//! A required element and a section headline are both strings on the wire,
//! but they mean different things to the coverage tracker. Each gets its own
//! newtype so one can never be passed where the other is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Trimmed, non-blank string newtypes.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Trims `value`; `None` when nothing is left.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let raw = value.into();
                match raw.trim() {
                    "" => None,
                    trimmed if trimmed.len() == raw.len() => Some(Self(raw)),
                    trimmed => Some(Self(trimmed.to_owned())),
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

/// One research-to-review run. Tags every span the orchestrator opens and
/// is stored in the run metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationRunId(Uuid);

impl GenerationRunId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for GenerationRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

string_id! {
    /// A plan-mandated topic that must appear somewhere in the final document.
    ///
    /// The label keeps the casing the planner supplied. Coverage comparisons
    /// are case-insensitive; see [`RequiredElement::normalized`].
    RequiredElement
}

impl RequiredElement {
    /// Lowercase form used for coverage membership checks.
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }
}

string_id! {
    /// The headline of one planned section (e.g. `"Building Vehicles"`).
    SectionHeadline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_are_rejected_and_others_trimmed() {
        assert!(RequiredElement::new("   ").is_none());
        let element = RequiredElement::new("  Ultrahand ").unwrap();
        assert_eq!(element.as_str(), "Ultrahand");
        assert_eq!(element.normalized(), "ultrahand");
    }

    #[test]
    fn identifiers_serialize_as_plain_strings() {
        let headline = SectionHeadline::new("Shrines").unwrap();
        assert_eq!(serde_json::to_string(&headline).unwrap(), "\"Shrines\"");
    }
}
