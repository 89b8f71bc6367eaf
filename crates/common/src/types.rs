//! Core types for Reelcheck

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Integer label naming a UI element class recognized by the detection
/// model (e.g. the spin button).
pub type ClassId = i32;

/// Sentinel class id returned by `start` for scripted (flow-less) test
/// types: there is nothing to step through server-side.
pub const SCRIPTED_SENTINEL_CLASS: ClassId = -1;

/// Axis-aligned bounding box in screenshot pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Center point of the box, the coordinate a click is aimed at.
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// The resolved detection for one requested class: at most one
/// candidate, or an explicit not-detected placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub class_id: ClassId,
    pub class_name: String,
    pub click_x: Option<f64>,
    pub click_y: Option<f64>,
    pub bounding_box: Option<BoundingBox>,
    pub confidence: f64,
}

impl DetectionResult {
    /// Placeholder for a class the model did not find in the image.
    pub fn not_detected(class_id: ClassId, class_name: String) -> Self {
        Self {
            class_id,
            class_name,
            click_x: None,
            click_y: None,
            bounding_box: None,
            confidence: 0.0,
        }
    }

    /// Whether the detection carries usable click coordinates.
    pub fn located(&self) -> bool {
        self.click_x.is_some() && self.click_y.is_some()
    }
}

/// Click coordinates relayed back to the automation client
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

/// One completed step attempt. Append-only; never mutated after
/// insertion into a run's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub expected_class_id: ClassId,
    pub passed: bool,
    pub detection: Option<DetectionResult>,
    /// Opaque key-value payload supplied by the caller describing the
    /// action it performed for the previous step.
    #[serde(default)]
    pub client_action_result: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Success,
    Partial,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::InProgress => write!(f, "in_progress"),
            RunStatus::Success => write!(f, "success"),
            RunStatus::Partial => write!(f, "partial"),
        }
    }
}

/// Mutable state of one in-flight test run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub run_id: String,
    pub test_type: String,
    pub game_url: String,
    /// Ordered sequence of expected class ids
    pub flow: Vec<ClassId>,
    /// Index of the next expected step; only ever increases
    pub cursor: usize,
    pub history: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    /// Last read/write time, used for TTL eviction
    pub last_touched: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(run_id: String, test_type: String, game_url: String, flow: Vec<ClassId>) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            test_type,
            game_url,
            flow,
            cursor: 0,
            history: Vec::new(),
            started_at: now,
            last_touched: now,
        }
    }

    /// The run is complete once the cursor has walked past the flow.
    pub fn is_complete(&self) -> bool {
        self.cursor >= self.flow.len()
    }

    /// The class id the caller must submit next, if any.
    pub fn expected_class(&self) -> Option<ClassId> {
        self.flow.get(self.cursor).copied()
    }

    /// Append a step record; the cursor advances only when the step
    /// passed.
    pub fn push_record(&mut self, record: StepRecord) {
        let passed = record.passed;
        self.history.push(record);
        if passed {
            self.cursor += 1;
        }
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_touched = Utc::now();
    }

    pub fn status(&self) -> RunStatus {
        if !self.is_complete() {
            RunStatus::InProgress
        } else if self.history.iter().all(|r| r.passed) {
            RunStatus::Success
        } else {
            RunStatus::Partial
        }
    }

    /// Read-only projection of the current run state.
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id.clone(),
            test_type: self.test_type.clone(),
            game_url: self.game_url.clone(),
            status: self.status(),
            cursor: self.cursor,
            flow: self.flow.clone(),
            history: self.history.clone(),
            started_at: self.started_at,
        }
    }
}

/// Read-only projection of a run, safe to return at any lifecycle point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: String,
    pub test_type: String,
    pub game_url: String,
    pub status: RunStatus,
    pub cursor: usize,
    pub flow: Vec<ClassId>,
    pub history: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
}

/// Instruction for the next step the automation client should perform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextStep {
    pub class_id: ClassId,
    pub class_name: Option<String>,
    pub clickable: bool,
    /// Coordinates of the detection from the step that just passed, so
    /// the caller can confirm or relay the click it performed.
    pub coordinates: Option<Coordinates>,
    pub instructions: String,
}

/// A single OCR text fragment matched against a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextMatch {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
    /// Normalized similarity ratio against the query, 0.0..=1.0
    pub similarity: f64,
}

/// Result of a single-query text search over a screenshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextSearchResult {
    pub found: bool,
    /// The max-confidence match, distinguished for the caller
    pub best: Option<TextMatch>,
    pub matches: Vec<TextMatch>,
}

/// Result of paragraph extraction over a screenshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParagraphResult {
    pub found: bool,
    pub paragraph: String,
}
