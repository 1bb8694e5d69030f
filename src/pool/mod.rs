//! Scheduling of CRL refresh cycles
//!
//! A [`Pool`] owns one [`Worker`] per CRL source. Every worker runs its own
//! loop in a dedicated task: fetch once, push to each device target in
//! order, sleep for the source's refresh interval, repeat. Failures are
//! reported through the [`Logger`] and never end a loop; only
//! [`Pool::stop_all`] does.

mod errors;
mod worker;

use std::sync::Arc;

use futures::future::join_all;
use tracing::info;

use crate::crl::{CrlFetcher, CrlSource, DEFAULT_FETCH_TIMEOUT, FetchResult};
use crate::device::DeviceTarget;
use crate::logger::Logger;

pub use errors::StartupError;
pub use worker::{CycleReport, Targets, Worker, WorkerState};

pub struct Pool {
    workers: Vec<Worker>,
    fetcher: CrlFetcher,
    started: bool,
}

impl Pool {
    /// Pool fetching with the default request timeout. Fails only when the
    /// HTTP client cannot be built.
    pub fn new() -> FetchResult<Self> {
        Ok(Self::with_fetcher(CrlFetcher::new(DEFAULT_FETCH_TIMEOUT)?))
    }

    /// Pool whose workers all share `fetcher`.
    pub fn with_fetcher(fetcher: CrlFetcher) -> Self {
        Self {
            workers: Vec::new(),
            fetcher,
            started: false,
        }
    }

    /// Register a worker for `source`. Workers are started and logged in
    /// registration order.
    pub fn add_source(&mut self, source: CrlSource) {
        self.workers.push(Worker::new(source, self.fetcher.clone()));
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// Launch every worker loop. Returns once all loops are spawned, before
    /// any of them completed a cycle.
    ///
    /// Nothing is started when an error is returned.
    pub fn start_all(
        &mut self,
        targets: Vec<Arc<dyn DeviceTarget>>,
        logger: Arc<dyn Logger>,
    ) -> Result<(), StartupError> {
        if targets.is_empty() {
            return Err(StartupError::NoTargets);
        }
        if self.workers.is_empty() {
            return Err(StartupError::NoSources);
        }
        if self.started {
            return Err(StartupError::AlreadyStarted);
        }
        if let Some(worker) = self
            .workers
            .iter()
            .find(|worker| worker.source().refresh_interval.is_zero())
        {
            return Err(StartupError::InvalidSource(worker.source().name.clone()));
        }

        let targets: Targets = targets.into();
        for worker in &mut self.workers {
            worker.start(Arc::clone(&targets), Arc::clone(&logger));
        }
        self.started = true;

        info!(
            "Started {} worker(s) pushing to {} target(s)",
            self.workers.len(),
            targets.len()
        );
        Ok(())
    }

    /// Signal every worker at once and wait until all of them stopped.
    ///
    /// Cycles in flight run to completion first. There is no upper bound on
    /// how long this takes.
    pub async fn stop_all(&mut self) {
        join_all(self.workers.iter_mut().map(|worker| worker.stop())).await;
        info!("All workers stopped");
    }
}
