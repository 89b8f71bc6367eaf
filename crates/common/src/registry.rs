//! Test definition registry
//!
//! A static mapping from test-type name to its flow definition (for
//! stepwise types) or its script sub-cases (for client-side scripted
//! types). Built once at process start; the single validation gate for
//! test-type names shared by both execution paths.

use crate::error::{Error, Result};
use crate::types::ClassId;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Names of the UI element classes the detection model recognizes,
/// indexed by class id.
static CLASS_NAMES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "load_game_button",   // 0
        "spin_button",        // 1
        "autoplay_button",    // 2
        "stop_autoplay",      // 3
        "balance_display",    // 4
        "bet_display",        // 5
        "purchase_button",    // 6
        "bet_settings",       // 7
        "close_button",       // 8
        "settings_button",    // 9
        "paytable_button",    // 10
        "collect_button",     // 11
        "win_animation",      // 12
        "start_autoplay",     // 13
        "help_button",        // 14
        "turbo_button",       // 15
        "sound_button",       // 16
    ]
});

/// Human-readable name for a class id, with a fallback for ids outside
/// the model's label set.
pub fn class_name(class_id: ClassId) -> String {
    usize::try_from(class_id)
        .ok()
        .and_then(|i| CLASS_NAMES.get(i))
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("class_{}", class_id))
}

/// How a test type executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// Server-side stepwise flow driven through the orchestrator
    Stepwise,
    /// Client-side execution via an emitted script plan
    Scripted,
}

/// A registered sub test case for scripted types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubCase {
    pub id: String,
    pub title: String,
}

/// One registered test type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDefinition {
    pub name: String,
    pub kind: TestKind,
    /// Ordered expected class ids; empty for scripted types
    pub flow: Vec<ClassId>,
    pub description: String,
    #[serde(default)]
    pub sub_cases: Vec<SubCase>,
}

impl TestDefinition {
    fn stepwise(name: &str, flow: Vec<ClassId>, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: TestKind::Stepwise,
            flow,
            description: description.to_string(),
            sub_cases: Vec::new(),
        }
    }

    fn scripted(name: &str, description: &str, sub_cases: Vec<(&str, &str)>) -> Self {
        Self {
            name: name.to_string(),
            kind: TestKind::Scripted,
            flow: Vec::new(),
            description: description.to_string(),
            sub_cases: sub_cases
                .into_iter()
                .map(|(id, title)| SubCase {
                    id: id.to_string(),
                    title: title.to_string(),
                })
                .collect(),
        }
    }
}

/// Registry of all known test types
#[derive(Debug, Clone)]
pub struct TestRegistry {
    defs: HashMap<String, TestDefinition>,
}

impl TestRegistry {
    /// Build the registry of built-in test types.
    pub fn builtin() -> Self {
        let defs = vec![
            TestDefinition::stepwise(
                "Banking",
                vec![9, 7, 6],
                "Settings -> Bet Settings -> Purchase Button",
            ),
            TestDefinition::stepwise(
                "Multiple Spin",
                vec![9, 7, 1, 1, 1, 1, 1],
                "Settings -> Bet Settings -> Spin Button (5 times), base game only",
            ),
            TestDefinition::stepwise(
                "Practice Play",
                vec![9, 2, 13, 1],
                "Settings -> AutoPlay -> Start AutoPlay -> Spin Button",
            ),
            TestDefinition::stepwise(
                "Playcheck",
                vec![9, 10, 1],
                "Settings -> Paytable -> Spin Button",
            ),
            TestDefinition::stepwise(
                "Regression",
                vec![0, 1, 1, 15, 7, 10, 11],
                "Load Game -> Spin -> Spin -> Turbo -> Bet Settings -> Paytable -> Collect",
            ),
            TestDefinition::scripted(
                "Session Reminder",
                "Verifies the session reminder popup and its continue/exit paths",
                vec![
                    ("sr_001", "Reminder popup shows Continue and Exit Game"),
                    ("sr_002", "Continue resumes play"),
                    ("sr_003", "Exit Game leaves the session"),
                    ("sr_004", "Reminder does not interrupt consecutive actions"),
                ],
            ),
            TestDefinition::scripted(
                "Max Bet Limit",
                "Verifies the stake selector cannot exceed the jurisdiction cap",
                vec![
                    ("mbl_001", "Stake capped at 6.25"),
                    ("mbl_002", "Stake capped at 5.00"),
                    ("mbl_003", "Stake capped at 3.00"),
                ],
            ),
        ];

        Self {
            defs: defs.into_iter().map(|d| (d.name.clone(), d)).collect(),
        }
    }

    /// Look up a test type, failing with `InvalidTestType` when the
    /// name is not registered.
    pub fn get(&self, test_type: &str) -> Result<&TestDefinition> {
        self.defs
            .get(test_type)
            .ok_or_else(|| Error::InvalidTestType(test_type.to_string()))
    }

    pub fn is_valid(&self, test_type: &str) -> bool {
        self.defs.contains_key(test_type)
    }

    /// All registered test-type names, sorted for stable listings.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.defs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn definitions(&self) -> impl Iterator<Item = &TestDefinition> {
        self.defs.values()
    }
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_flows_match_definitions() {
        let reg = TestRegistry::builtin();
        assert_eq!(reg.get("Banking").unwrap().flow, vec![9, 7, 6]);
        assert_eq!(
            reg.get("Multiple Spin").unwrap().flow,
            vec![9, 7, 1, 1, 1, 1, 1]
        );
        assert_eq!(reg.get("Practice Play").unwrap().flow, vec![9, 2, 13, 1]);
        assert_eq!(reg.get("Playcheck").unwrap().flow, vec![9, 10, 1]);
        assert_eq!(
            reg.get("Regression").unwrap().flow,
            vec![0, 1, 1, 15, 7, 10, 11]
        );
    }

    #[test]
    fn scripted_types_have_empty_flows() {
        let reg = TestRegistry::builtin();
        for name in ["Session Reminder", "Max Bet Limit"] {
            let def = reg.get(name).unwrap();
            assert_eq!(def.kind, TestKind::Scripted);
            assert!(def.flow.is_empty());
            assert!(!def.sub_cases.is_empty());
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let reg = TestRegistry::builtin();
        assert!(matches!(
            reg.get("Roulette"),
            Err(Error::InvalidTestType(_))
        ));
        assert!(!reg.is_valid("Roulette"));
    }

    #[test]
    fn class_names_cover_model_labels() {
        assert_eq!(class_name(1), "spin_button");
        assert_eq!(class_name(9), "settings_button");
        assert_eq!(class_name(42), "class_42");
        assert_eq!(class_name(-1), "class_-1");
    }
}
