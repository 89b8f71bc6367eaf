//! Detection adapter contract and per-class target resolution

use async_trait::async_trait;
use image::DynamicImage;
use reelcheck_common::registry::class_name;
use reelcheck_common::{BoundingBox, ClassId, DetectionResult, Result};
use serde::{Deserialize, Serialize};

/// One raw model detection, before per-class resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: ClassId,
    pub bounding_box: BoundingBox,
    pub confidence: f64,
}

/// Black-box object detection model: image in, raw candidates out.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<RawDetection>>;
}

/// Resolve raw detections into exactly one result per requested class.
///
/// The highest-confidence candidate wins; ties keep the first
/// encountered candidate so resolution stays stable across calls.
/// Classes with no candidate get an explicit not-detected placeholder,
/// so the caller always receives one entry per requested class.
pub fn resolve_targets(raw: &[RawDetection], class_ids: &[ClassId]) -> Vec<DetectionResult> {
    class_ids
        .iter()
        .map(|&class_id| {
            let mut best: Option<&RawDetection> = None;
            for det in raw.iter().filter(|d| d.class_id == class_id) {
                match best {
                    Some(b) if det.confidence <= b.confidence => {}
                    _ => best = Some(det),
                }
            }

            match best {
                Some(det) => {
                    let (cx, cy) = det.bounding_box.center();
                    DetectionResult {
                        class_id,
                        class_name: class_name(class_id),
                        click_x: Some(cx),
                        click_y: Some(cy),
                        bounding_box: Some(det.bounding_box),
                        confidence: det.confidence,
                    }
                }
                None => DetectionResult::not_detected(class_id, class_name(class_id)),
            }
        })
        .collect()
}
