//! Bounded inference gate
//!
//! Detection and OCR backends can be slow and are often not safe to
//! call concurrently (GPU-bound engines in particular). The gate
//! bounds in-flight calls with a semaphore and puts a hard ceiling on
//! how long a single call may run.

use reelcheck_common::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct InferenceGate {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl InferenceGate {
    pub fn new(max_concurrency: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            timeout,
        }
    }

    /// Run an inference call under the gate. Exceeding the deadline
    /// yields `DetectionTimeout`; the permit is held for the full call
    /// so a timed-out backend cannot be re-entered early.
    pub async fn run<F, T>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::Internal("inference gate closed".to_string()))?;

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::DetectionTimeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}
