//! Declarative script plans for client-side test types
//!
//! Some test types (Session Reminder, Max Bet Limit) are validated in
//! the automation client rather than stepped through server-side. For
//! those the orchestrator emits a parameterized action list as data;
//! rendering into any particular scripting surface is the client's
//! concern and stays out of the core.

use crate::error::{Error, Result};
use crate::types::ClassId;
use serde::{Deserialize, Serialize};

/// One instruction for the automation client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    /// Capture a fresh screenshot of the game surface
    Capture,
    /// Run object detection for one class against the last capture
    Detect { class_id: ClassId },
    /// Click the coordinates of the last successful detection
    Click,
    /// Wait before the next action
    Wait { seconds: u64 },
    /// Search the last capture for a text query
    FindText { query: String },
    /// Click the centroid of the best text match
    ClickMatch,
    /// Assert the text query is present in the last capture
    ExpectText { query: String },
    /// Extract the numeric amount following a label via paragraph OCR
    ReadAmount { label: String },
    /// Assert the last read amount does not exceed the limit
    AssertAtMost { limit: f64 },
}

/// A rendered plan for one scripted test sub-case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptPlan {
    pub test_type: String,
    pub sub_case: String,
    pub actions: Vec<ScriptAction>,
}

impl ScriptPlan {
    /// Render the plan for a scripted test type and sub-case id.
    pub fn render(test_type: &str, sub_case: &str) -> Result<Self> {
        let actions = match test_type {
            "Session Reminder" => session_reminder_actions(sub_case),
            "Max Bet Limit" => max_bet_limit_actions(sub_case),
            _ => None,
        }
        .ok_or_else(|| Error::UnknownSubCase {
            test_type: test_type.to_string(),
            sub_case: sub_case.to_string(),
        })?;

        Ok(Self {
            test_type: test_type.to_string(),
            sub_case: sub_case.to_string(),
            actions,
        })
    }
}

fn session_reminder_actions(sub_case: &str) -> Option<Vec<ScriptAction>> {
    use ScriptAction::*;

    // All session reminder cases trigger play first, then wait out the
    // reminder interval before inspecting the popup.
    let trigger = vec![Capture, Detect { class_id: 0 }, Click];

    let actions = match sub_case {
        "sr_001" => {
            let mut a = trigger;
            a.extend([
                Wait { seconds: 60 },
                Capture,
                ExpectText { query: "Continue".into() },
                ExpectText { query: "Exit Game".into() },
            ]);
            a
        }
        "sr_002" => {
            let mut a = trigger;
            a.extend([
                Wait { seconds: 60 },
                Capture,
                FindText { query: "Continue".into() },
                ClickMatch,
                Capture,
                Detect { class_id: 1 },
                Click,
            ]);
            a
        }
        "sr_003" => {
            let mut a = trigger;
            a.extend([
                Wait { seconds: 60 },
                Capture,
                FindText { query: "Exit Game".into() },
                ClickMatch,
                Wait { seconds: 20 },
                Capture,
                ExpectText { query: "Error".into() },
            ]);
            a
        }
        "sr_004" => {
            let mut a = trigger;
            a.extend([Capture, Detect { class_id: 1 }, Click]);
            a
        }
        _ => return None,
    };
    Some(actions)
}

fn max_bet_limit_actions(sub_case: &str) -> Option<Vec<ScriptAction>> {
    use ScriptAction::*;

    let limit = match sub_case {
        "mbl_001" => 6.25,
        "mbl_002" => 5.00,
        "mbl_003" => 3.00,
        _ => return None,
    };

    // Open the game, raise the stake selector to its ceiling through
    // bet settings, then read the displayed total stake back via OCR.
    Some(vec![
        Capture,
        Detect { class_id: 0 },
        Click,
        Wait { seconds: 10 },
        Capture,
        Detect { class_id: 0 },
        Click,
        Capture,
        Detect { class_id: 15 },
        Click,
        Capture,
        Detect { class_id: 7 },
        Click,
        Capture,
        ReadAmount { label: "Total stake".into() },
        AssertAtMost { limit },
    ])
}
