//! Reelcheck Engine
//!
//! The stepwise test-execution core: the orchestrator state machine,
//! the volatile execution-context store, the validation policy, and the
//! detection/OCR adapter contracts with their command-backed
//! implementations.

pub mod backend;
pub mod config;
pub mod detect;
pub mod image;
pub mod infer;
pub mod ocr;
pub mod orchestrator;
pub mod store;

pub use backend::{CommandDetector, CommandRecognizer};
pub use config::EngineConfig;
pub use detect::{Detector, RawDetection};
pub use infer::InferenceGate;
pub use ocr::{TextFragment, TextRecognizer};
pub use orchestrator::{Orchestrator, StartOutcome, StepOutcome, ValidationPolicy};
pub use store::ContextStore;
