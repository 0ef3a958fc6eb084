//! Bounded async front for [`CryPipeline`]
//!
//! Requests run on tokio's blocking pool. Two semaphores shape the load:
//! `workers` caps how many pipelines execute at once, and `admission` caps
//! executing plus queued requests. Permits travel into the blocking task, so
//! a request that times out keeps its slot until its work actually finishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use petcry_core::{ModelUnavailable, PipelineError, Prediction};

use crate::pipeline::CryPipeline;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Concurrent pipeline executions
    pub workers: usize,
    /// Requests allowed to wait for a worker
    pub queue_depth: usize,
    /// Whole-request deadline, queueing included
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            workers,
            queue_depth: workers * 4,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone)]
pub struct CryEngine {
    pipeline: Arc<CryPipeline>,
    workers: Arc<Semaphore>,
    admission: Arc<Semaphore>,
    config: EngineConfig,
}

impl std::fmt::Debug for CryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryEngine")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl CryEngine {
    pub fn new(pipeline: Arc<CryPipeline>, config: EngineConfig) -> Self {
        let workers = config.workers.max(1);
        let config = EngineConfig { workers, ..config };
        Self {
            pipeline,
            workers: Arc::new(Semaphore::new(workers)),
            admission: Arc::new(Semaphore::new(workers + config.queue_depth)),
            config,
        }
    }

    pub fn pipeline(&self) -> &Arc<CryPipeline> {
        &self.pipeline
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Requests currently executing or queued.
    pub fn in_flight(&self) -> usize {
        (self.config.workers + self.config.queue_depth) - self.admission.available_permits()
    }

    /// Classify, waiting for capacity if the queue is full.
    ///
    /// The timeout covers waiting and execution alike.
    pub async fn predict(
        &self,
        audio: Vec<u8>,
        species: Option<String>,
    ) -> Result<Prediction, PipelineError> {
        let timeout = self.config.request_timeout;
        let work = async move {
            let admission = self
                .admission
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ModelUnavailable::NotLoaded)?;
            self.execute(admission, audio, species).await
        };

        match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Request timed out after {:?}", timeout);
                Err(ModelUnavailable::Timeout(timeout).into())
            }
        }
    }

    /// Classify, failing fast with `Saturated` when the queue is full.
    pub async fn try_predict(
        &self,
        audio: Vec<u8>,
        species: Option<String>,
    ) -> Result<Prediction, PipelineError> {
        let admission = match self.admission.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                return Err(ModelUnavailable::Saturated {
                    queue_depth: self.config.queue_depth,
                }
                .into())
            }
            Err(TryAcquireError::Closed) => return Err(ModelUnavailable::NotLoaded.into()),
        };

        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, self.execute(admission, audio, species)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Request timed out after {:?}", timeout);
                Err(ModelUnavailable::Timeout(timeout).into())
            }
        }
    }

    async fn execute(
        &self,
        admission: OwnedSemaphorePermit,
        audio: Vec<u8>,
        species: Option<String>,
    ) -> Result<Prediction, PipelineError> {
        let worker = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ModelUnavailable::NotLoaded)?;

        let pipeline = self.pipeline.clone();
        tokio::task::spawn_blocking(move || {
            let _permits = (admission, worker);
            pipeline.predict(&audio, species.as_deref())
        })
        .await
        .map_err(|e| ModelUnavailable::Backend(format!("worker failed: {}", e)))?
    }

    /// Stop accepting requests. Work already running completes.
    pub fn close(&self) {
        self.admission.close();
        self.workers.close();
    }
}
