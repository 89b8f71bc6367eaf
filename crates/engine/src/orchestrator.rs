//! Test orchestration state machine
//!
//! The orchestrator owns the run lifecycle: `start` creates an
//! execution context (or emits a script plan for client-side types),
//! `step` validates one submitted screenshot against the expected flow
//! position, and `results` projects a run at any point. A failed step
//! never terminates a run; the caller retries by resubmitting the same
//! class with a fresh screenshot.

use crate::config::EngineConfig;
use crate::detect::{resolve_targets, Detector};
use crate::image::decode_screenshot;
use crate::infer::InferenceGate;
use crate::ocr::{self, TextRecognizer};
use crate::store::ContextStore;
use chrono::Utc;
use reelcheck_common::ids::run_id;
use reelcheck_common::registry::{class_name, TestKind, TestRegistry};
use reelcheck_common::{
    ClassId, Coordinates, DetectionResult, Error, ExecutionContext, NextStep, ParagraphResult,
    Result, RunSnapshot, ScriptPlan, StepRecord, TextSearchResult, SCRIPTED_SENTINEL_CLASS,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pass/fail policy for a single step's detection
#[derive(Debug, Clone, Copy)]
pub struct ValidationPolicy {
    pub min_confidence: f64,
}

impl ValidationPolicy {
    /// A step passes when the expected element was located with
    /// sufficient confidence.
    pub fn step_passes(&self, detection: &DetectionResult) -> bool {
        detection.located() && detection.confidence >= self.min_confidence
    }
}

/// What `start` hands back to the caller
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// A stepwise run: drive it through `step` submissions.
    Stepwise { run_id: String, next_step: NextStep },
    /// A scripted run: execute the plan client-side; there is nothing
    /// to step through server-side.
    Scripted {
        run_id: String,
        next_step: NextStep,
        plan: ScriptPlan,
    },
}

impl StartOutcome {
    pub fn run_id(&self) -> &str {
        match self {
            StartOutcome::Stepwise { run_id, .. } => run_id,
            StartOutcome::Scripted { run_id, .. } => run_id,
        }
    }
}

/// What one `step` submission produced
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// The flow continues; `next_step` names the class to submit next
    /// (the same class again when the step failed).
    Continue {
        step: StepRecord,
        next_step: NextStep,
    },
    /// The cursor walked past the flow; the run is terminal.
    Complete {
        step: StepRecord,
        final_result: RunSnapshot,
    },
}

pub struct Orchestrator {
    registry: TestRegistry,
    store: ContextStore,
    detector: Arc<dyn Detector>,
    recognizer: Arc<dyn TextRecognizer>,
    gate: InferenceGate,
    policy: ValidationPolicy,
}

impl Orchestrator {
    pub fn new(
        config: &EngineConfig,
        detector: Arc<dyn Detector>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Self {
        Self {
            registry: TestRegistry::builtin(),
            store: ContextStore::new(Duration::from_secs(config.run_ttl_secs)),
            detector,
            recognizer,
            gate: InferenceGate::new(
                config.max_inference_concurrency,
                Duration::from_secs(config.detection_timeout_secs),
            ),
            policy: ValidationPolicy {
                min_confidence: config.min_confidence,
            },
        }
    }

    pub fn registry(&self) -> &TestRegistry {
        &self.registry
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    /// Start a run. Stepwise types get an execution context and the
    /// first expected step; scripted types additionally require a
    /// sub-case id and get a rendered action plan.
    pub fn start(
        &self,
        test_type: &str,
        game_url: &str,
        sub_case: Option<&str>,
    ) -> Result<StartOutcome> {
        let def = self.registry.get(test_type)?;
        if game_url.trim().is_empty() {
            return Err(Error::Validation("game_url must not be empty".to_string()));
        }

        match def.kind {
            TestKind::Stepwise => {
                let id = run_id(test_type, game_url, Utc::now());
                let ctx = ExecutionContext::new(
                    id.clone(),
                    test_type.to_string(),
                    game_url.to_string(),
                    def.flow.clone(),
                );
                let first = ctx
                    .expected_class()
                    .ok_or_else(|| Error::Internal(format!("empty flow for {}", test_type)))?;
                self.store.create(ctx);
                info!(run_id = %id, test_type, "run started");
                Ok(StartOutcome::Stepwise {
                    run_id: id,
                    next_step: instruction_for(first, None),
                })
            }
            TestKind::Scripted => {
                let sub = sub_case.ok_or_else(|| {
                    Error::Validation(format!(
                        "sub_case is required for scripted test type '{}'",
                        test_type
                    ))
                })?;
                let plan = ScriptPlan::render(test_type, sub)?;
                // Scripted runs execute entirely client-side; no
                // execution context is kept for them.
                let id = run_id(test_type, game_url, Utc::now());
                info!(run_id = %id, test_type, sub_case = sub, "scripted run started");
                Ok(StartOutcome::Scripted {
                    run_id: id,
                    next_step: NextStep {
                        class_id: SCRIPTED_SENTINEL_CLASS,
                        class_name: None,
                        clickable: false,
                        coordinates: None,
                        instructions: "execute the emitted script plan in the automation client"
                            .to_string(),
                    },
                    plan,
                })
            }
        }
    }

    /// Submit one step of a stepwise run.
    ///
    /// Client errors (unknown run, completed flow, class mismatch,
    /// malformed screenshot) reject the submission without touching run
    /// state. A backend failure is absorbed as a failed step so the run
    /// stays resumable.
    pub async fn step(
        &self,
        run_id: &str,
        class_id: ClassId,
        screenshot: &str,
        client_action_result: serde_json::Value,
    ) -> Result<StepOutcome> {
        let handle = self.store.get(run_id)?;
        let mut ctx = handle.lock().await;

        if ctx.is_complete() {
            return Err(Error::FlowAlreadyComplete(run_id.to_string()));
        }
        let expected = ctx
            .expected_class()
            .ok_or_else(|| Error::FlowAlreadyComplete(run_id.to_string()))?;
        if class_id != expected {
            return Err(Error::ClassMismatch {
                expected,
                submitted: class_id,
            });
        }

        // Decode before any state change so a bad payload costs nothing.
        let image = decode_screenshot(screenshot)?;

        let detection = match self.gate.run(self.detector.detect(&image)).await {
            Ok(raw) => {
                let mut resolved = resolve_targets(&raw, &[class_id]);
                Some(resolved.remove(0))
            }
            Err(e) => {
                warn!(run_id, class_id, error = %e, "detection backend failed, recording step as failed");
                None
            }
        };

        let passed = detection
            .as_ref()
            .map(|d| self.policy.step_passes(d))
            .unwrap_or(false);

        let record = StepRecord {
            expected_class_id: class_id,
            passed,
            detection,
            client_action_result,
            timestamp: Utc::now(),
        };
        ctx.push_record(record.clone());
        debug!(
            run_id,
            class_id,
            passed,
            cursor = ctx.cursor,
            of = ctx.flow.len(),
            "step recorded"
        );

        if ctx.is_complete() {
            let final_result = ctx.snapshot();
            info!(run_id, status = %final_result.status, "run complete");
            return Ok(StepOutcome::Complete {
                step: record,
                final_result,
            });
        }

        // On a pass, relay the click coordinates of the detection just
        // validated; on a fail the caller retries the same class.
        let coordinates = if passed {
            record.detection.as_ref().and_then(|d| {
                Some(Coordinates {
                    x: d.click_x?,
                    y: d.click_y?,
                })
            })
        } else {
            None
        };
        let next = ctx
            .expected_class()
            .ok_or_else(|| Error::Internal("incomplete run without expected class".to_string()))?;

        Ok(StepOutcome::Continue {
            step: record,
            next_step: instruction_for(next, coordinates),
        })
    }

    /// Current snapshot of a run at any lifecycle point.
    pub async fn results(&self, run_id: &str) -> Result<RunSnapshot> {
        self.store.snapshot(run_id).await
    }

    /// Single-shot detection outside any run: one resolved result per
    /// requested class.
    pub async fn detect_elements(
        &self,
        screenshot: &str,
        class_ids: &[ClassId],
    ) -> Result<Vec<DetectionResult>> {
        if class_ids.is_empty() {
            return Err(Error::Validation(
                "class_ids must not be empty".to_string(),
            ));
        }
        let image = decode_screenshot(screenshot)?;
        let raw = self.gate.run(self.detector.detect(&image)).await?;
        Ok(resolve_targets(&raw, class_ids))
    }

    /// Fuzzy text search over a screenshot.
    pub async fn find_text(&self, screenshot: &str, query: &str) -> Result<TextSearchResult> {
        if query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".to_string()));
        }
        let image = decode_screenshot(screenshot)?;
        let fragments = self.gate.run(self.recognizer.recognize(&image)).await?;
        Ok(ocr::find_text(&fragments, query))
    }

    /// Assemble all recognized text into one reading-order paragraph.
    pub async fn extract_paragraph(&self, screenshot: &str) -> Result<ParagraphResult> {
        let image = decode_screenshot(screenshot)?;
        let fragments = self.gate.run(self.recognizer.recognize(&image)).await?;
        Ok(ocr::assemble_paragraph(&fragments))
    }
}

fn instruction_for(class_id: ClassId, coordinates: Option<Coordinates>) -> NextStep {
    let name = class_name(class_id);
    NextStep {
        class_id,
        class_name: Some(name.clone()),
        clickable: true,
        coordinates,
        instructions: format!("capture the game and submit a screenshot showing the {}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::RawDetection;
    use crate::image::test_support::sample_screenshot;
    use crate::ocr::TextFragment;
    use async_trait::async_trait;
    use image::DynamicImage;
    use reelcheck_common::{BoundingBox, RunStatus, ScriptAction};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Detector stub fed a queue of scripted responses.
    struct ScriptedDetector {
        responses: Mutex<VecDeque<Result<Vec<RawDetection>>>>,
    }

    impl ScriptedDetector {
        fn new(responses: Vec<Result<Vec<RawDetection>>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl Detector for ScriptedDetector {
        async fn detect(&self, _image: &DynamicImage) -> Result<Vec<RawDetection>> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    struct FixedRecognizer {
        fragments: Vec<TextFragment>,
    }

    #[async_trait]
    impl TextRecognizer for FixedRecognizer {
        async fn recognize(&self, _image: &DynamicImage) -> Result<Vec<TextFragment>> {
            Ok(self.fragments.clone())
        }
    }

    fn hit(class_id: ClassId, confidence: f64) -> Vec<RawDetection> {
        vec![RawDetection {
            class_id,
            bounding_box: BoundingBox {
                x1: 10.0,
                y1: 20.0,
                x2: 30.0,
                y2: 40.0,
            },
            confidence,
        }]
    }

    fn orchestrator(
        detections: Vec<Result<Vec<RawDetection>>>,
        fragments: Vec<TextFragment>,
    ) -> Orchestrator {
        Orchestrator::new(
            &EngineConfig::default(),
            Arc::new(ScriptedDetector::new(detections)),
            Arc::new(FixedRecognizer { fragments }),
        )
    }

    #[tokio::test]
    async fn clean_banking_flow_completes_with_success() {
        let orch = orchestrator(
            vec![Ok(hit(9, 0.9)), Ok(hit(7, 0.8)), Ok(hit(6, 0.95))],
            Vec::new(),
        );
        let shot = sample_screenshot();

        let start = orch.start("Banking", "https://example.test/game", None).unwrap();
        let (run_id, first) = match start {
            StartOutcome::Stepwise { run_id, next_step } => (run_id, next_step),
            _ => panic!("banking is stepwise"),
        };
        assert_eq!(first.class_id, 9);
        assert_eq!(first.class_name.as_deref(), Some("settings_button"));

        let mut current = 9;
        for expected_next in [Some(7), Some(6), None] {
            let outcome = orch
                .step(&run_id, current, &shot, serde_json::Value::Null)
                .await
                .unwrap();
            match (outcome, expected_next) {
                (StepOutcome::Continue { step, next_step }, Some(next)) => {
                    assert!(step.passed);
                    assert_eq!(next_step.class_id, next);
                    assert!(next_step.coordinates.is_some());
                    current = next;
                }
                (StepOutcome::Complete { step, final_result }, None) => {
                    assert!(step.passed);
                    assert_eq!(final_result.status, RunStatus::Success);
                    assert_eq!(final_result.history.len(), 3);
                }
                _ => panic!("flow diverged"),
            }
        }
    }

    #[tokio::test]
    async fn failed_step_is_retried_by_resubmission() {
        // First attempt at class 9 finds nothing, the retry passes.
        let orch = orchestrator(vec![Ok(Vec::new()), Ok(hit(9, 0.9))], Vec::new());
        let shot = sample_screenshot();
        let start = orch.start("Banking", "https://example.test/game", None).unwrap();
        let run_id = start.run_id().to_string();

        let outcome = orch
            .step(&run_id, 9, &shot, serde_json::Value::Null)
            .await
            .unwrap();
        match outcome {
            StepOutcome::Continue { step, next_step } => {
                assert!(!step.passed);
                // Cursor held: same class expected again, no coordinates.
                assert_eq!(next_step.class_id, 9);
                assert!(next_step.coordinates.is_none());
            }
            _ => panic!("run should not be complete"),
        }

        let outcome = orch
            .step(&run_id, 9, &shot, serde_json::Value::Null)
            .await
            .unwrap();
        match outcome {
            StepOutcome::Continue { step, next_step } => {
                assert!(step.passed);
                assert_eq!(next_step.class_id, 7);
            }
            _ => panic!("run should not be complete"),
        }

        let snap = orch.results(&run_id).await.unwrap();
        assert_eq!(snap.status, RunStatus::InProgress);
        assert_eq!(snap.history.len(), 2);
        assert_eq!(snap.cursor, 1);
    }

    #[tokio::test]
    async fn low_confidence_detection_fails_the_step() {
        let orch = orchestrator(vec![Ok(hit(9, 0.3))], Vec::new());
        let shot = sample_screenshot();
        let start = orch.start("Banking", "https://example.test/game", None).unwrap();

        let outcome = orch
            .step(start.run_id(), 9, &shot, serde_json::Value::Null)
            .await
            .unwrap();
        match outcome {
            StepOutcome::Continue { step, .. } => {
                assert!(!step.passed);
                // The detection itself is still recorded for diagnosis.
                assert_eq!(step.detection.unwrap().confidence, 0.3);
            }
            _ => panic!("run should not be complete"),
        }
    }

    #[tokio::test]
    async fn backend_failure_is_absorbed_as_failed_step() {
        let orch = orchestrator(
            vec![Err(Error::Adapter("model crashed".to_string())), Ok(hit(9, 0.9))],
            Vec::new(),
        );
        let shot = sample_screenshot();
        let start = orch.start("Banking", "https://example.test/game", None).unwrap();
        let run_id = start.run_id().to_string();

        let outcome = orch
            .step(&run_id, 9, &shot, serde_json::Value::Null)
            .await
            .unwrap();
        match outcome {
            StepOutcome::Continue { step, .. } => {
                assert!(!step.passed);
                assert!(step.detection.is_none());
            }
            _ => panic!("run should not be complete"),
        }

        // The run stays resumable after the backend recovers.
        let outcome = orch
            .step(&run_id, 9, &shot, serde_json::Value::Null)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            StepOutcome::Continue { ref step, .. } if step.passed
        ));
    }

    #[tokio::test]
    async fn class_mismatch_leaves_state_unchanged() {
        let orch = orchestrator(Vec::new(), Vec::new());
        let shot = sample_screenshot();
        let start = orch.start("Banking", "https://example.test/game", None).unwrap();
        let run_id = start.run_id().to_string();

        let err = orch
            .step(&run_id, 6, &shot, serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ClassMismatch {
                expected: 9,
                submitted: 6
            }
        ));

        let snap = orch.results(&run_id).await.unwrap();
        assert_eq!(snap.cursor, 0);
        assert!(snap.history.is_empty());
    }

    #[tokio::test]
    async fn malformed_screenshot_leaves_state_unchanged() {
        let orch = orchestrator(Vec::new(), Vec::new());
        let start = orch.start("Banking", "https://example.test/game", None).unwrap();
        let run_id = start.run_id().to_string();

        let err = orch
            .step(&run_id, 9, "!!not an image!!", serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidImageData(_)));

        let snap = orch.results(&run_id).await.unwrap();
        assert!(snap.history.is_empty());
    }

    #[tokio::test]
    async fn completed_run_rejects_further_steps() {
        let orch = orchestrator(
            vec![Ok(hit(9, 0.9)), Ok(hit(10, 0.9)), Ok(hit(1, 0.9))],
            Vec::new(),
        );
        let shot = sample_screenshot();
        let start = orch.start("Playcheck", "https://example.test/game", None).unwrap();
        let run_id = start.run_id().to_string();

        for class_id in [9, 10, 1] {
            orch.step(&run_id, class_id, &shot, serde_json::Value::Null)
                .await
                .unwrap();
        }

        let err = orch
            .step(&run_id, 1, &shot, serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FlowAlreadyComplete(_)));

        // Results remain readable after completion.
        let snap = orch.results(&run_id).await.unwrap();
        assert_eq!(snap.status, RunStatus::Success);
    }

    #[tokio::test]
    async fn unknown_run_is_rejected() {
        let orch = orchestrator(Vec::new(), Vec::new());
        let err = orch
            .step("banking_000000000000", 9, &sample_screenshot(), serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownRun(_)));
    }

    #[tokio::test]
    async fn scripted_start_emits_plan_and_sentinel() {
        let orch = orchestrator(Vec::new(), Vec::new());
        let start = orch
            .start("Max Bet Limit", "https://example.test/game", Some("mbl_002"))
            .unwrap();
        match start {
            StartOutcome::Scripted {
                run_id,
                next_step,
                plan,
            } => {
                assert!(run_id.starts_with("max_bet_limit_"));
                assert_eq!(next_step.class_id, SCRIPTED_SENTINEL_CLASS);
                assert!(!next_step.clickable);
                assert!(plan
                    .actions
                    .iter()
                    .any(|a| matches!(a, ScriptAction::AssertAtMost { limit } if *limit == 5.00)));
            }
            _ => panic!("max bet limit is scripted"),
        }
    }

    #[tokio::test]
    async fn scripted_start_requires_sub_case() {
        let orch = orchestrator(Vec::new(), Vec::new());
        assert!(matches!(
            orch.start("Session Reminder", "https://example.test/game", None),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            orch.start("Session Reminder", "https://example.test/game", Some("sr_099")),
            Err(Error::UnknownSubCase { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_start_inputs_are_rejected() {
        let orch = orchestrator(Vec::new(), Vec::new());
        assert!(matches!(
            orch.start("Roulette", "https://example.test/game", None),
            Err(Error::InvalidTestType(_))
        ));
        assert!(matches!(
            orch.start("Banking", "   ", None),
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn single_shot_detection_resolves_all_requested_classes() {
        let mut raw = hit(1, 0.9);
        raw.extend(hit(1, 0.7));
        let orch = orchestrator(vec![Ok(raw)], Vec::new());

        let results = orch
            .detect_elements(&sample_screenshot(), &[1, 9])
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].confidence, 0.9);
        assert!(!results[1].located());

        assert!(matches!(
            orch.detect_elements(&sample_screenshot(), &[]).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn text_operations_run_through_the_recognizer() {
        let fragments = vec![
            TextFragment {
                text: "Net".to_string(),
                x: 10.0,
                y: 10.0,
                confidence: 0.9,
            },
            TextFragment {
                text: "position: 0.00".to_string(),
                x: 60.0,
                y: 10.0,
                confidence: 0.9,
            },
        ];
        let orch = orchestrator(Vec::new(), fragments);
        let shot = sample_screenshot();

        let search = orch.find_text(&shot, "Net").await.unwrap();
        assert!(search.found);

        let paragraph = orch.extract_paragraph(&shot).await.unwrap();
        assert_eq!(paragraph.paragraph, "Net position: 0.00");

        assert!(matches!(
            orch.find_text(&shot, "  ").await,
            Err(Error::Validation(_))
        ));
    }
}
