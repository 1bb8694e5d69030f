use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::crl::{CrlFetcher, CrlSource};
use crate::device::DeviceTarget;
use crate::logger::Logger;
use crate::push::{artifact_name, push_crl};

/// Device targets shared by every worker of a pool.
pub type Targets = Arc<[Arc<dyn DeviceTarget>]>;

/// Lifecycle of a [`Worker`]; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// What one refresh cycle achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: bool,
    pub pushed: usize,
    pub failed: usize,
}

/// Everything a cycle needs, shared between the loop and each cycle task.
struct CycleContext {
    source: CrlSource,
    fetcher: CrlFetcher,
    targets: Targets,
    logger: Arc<dyn Logger>,
}

impl CycleContext {
    /// Fetch once, then push to every target in order. Never fails: every
    /// problem is reported to the logger.
    async fn run_cycle(&self) -> CycleReport {
        let source = &self.source;
        let mut report = CycleReport::default();

        let document = match self.fetcher.fetch(&source.url, source.validate).await {
            Ok(document) => document,
            Err(e) => {
                self.logger.error(&format!("crl {}: {e}", source.name));
                return report;
            }
        };
        report.fetched = true;

        // One name per cycle, whatever the number of targets.
        let artifact = artifact_name(&source.name, Utc::now());

        for target in self.targets.iter() {
            match push_crl(target.as_ref(), &document, &source.profile_name, &artifact).await {
                Ok(reference) => {
                    report.pushed += 1;
                    self.logger.notice(&format!(
                        "crl {}: profile {} on {} now uses {}",
                        source.name,
                        source.profile_name,
                        target.name(),
                        reference
                    ));
                }
                Err(e) => {
                    report.failed += 1;
                    self.logger.error(&format!(
                        "crl {}: target {}: {e}",
                        source.name,
                        target.name()
                    ));
                }
            }
        }

        report
    }

    /// Run one cycle in its own task so a panic cannot take the loop down.
    async fn run_guarded_cycle(self: &Arc<Self>) -> Option<CycleReport> {
        let context = Arc::clone(self);
        match tokio::spawn(async move { context.run_cycle().await }).await {
            Ok(report) => {
                debug!("crl {}: cycle finished: {:?}", self.source.name, report);
                Some(report)
            }
            Err(e) => {
                self.logger
                    .error(&format!("crl {}: cycle aborted: {e}", self.source.name));
                None
            }
        }
    }
}

/// Refreshes one CRL source on its own schedule, forever, until stopped.
pub struct Worker {
    source: CrlSource,
    fetcher: CrlFetcher,
    state: Arc<watch::Sender<WorkerState>>,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new(source: CrlSource, fetcher: CrlFetcher) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            source,
            fetcher,
            state: Arc::new(state),
            stop_tx: None,
            handle: None,
        }
    }

    pub fn source(&self) -> &CrlSource {
        &self.source
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Run a single cycle inline, outside of any schedule.
    pub async fn run_once(&self, targets: Targets, logger: Arc<dyn Logger>) -> CycleReport {
        let context = CycleContext {
            source: self.source.clone(),
            fetcher: self.fetcher.clone(),
            targets,
            logger,
        };
        context.run_cycle().await
    }

    /// Spawn the refresh loop. The first cycle starts right away.
    ///
    /// Returns `false` if the worker already left the `Idle` state.
    pub fn start(&mut self, targets: Targets, logger: Arc<dyn Logger>) -> bool {
        if self.state() != WorkerState::Idle {
            return false;
        }

        let context = Arc::new(CycleContext {
            source: self.source.clone(),
            fetcher: self.fetcher.clone(),
            targets,
            logger,
        });
        let (stop_tx, stop_rx) = oneshot::channel();

        self.state.send_replace(WorkerState::Running);
        self.stop_tx = Some(stop_tx);
        self.handle = Some(tokio::spawn(run_loop(
            context,
            stop_rx,
            Arc::clone(&self.state),
        )));
        true
    }

    /// Signal the loop and wait until it exited. A cycle in flight is
    /// allowed to finish first; there is no timeout.
    pub async fn stop(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return;
        };

        self.state.send_replace(WorkerState::Stopping);
        // The loop may already be gone; joining below covers both cases.
        let _ = stop_tx.send(());

        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            error!("crl {}: worker task failed: {}", self.source.name, e);
        }
        self.state.send_replace(WorkerState::Stopped);
    }
}

async fn run_loop(
    context: Arc<CycleContext>,
    mut stop_rx: oneshot::Receiver<()>,
    state: Arc<watch::Sender<WorkerState>>,
) {
    let interval = context.source.refresh_interval;
    debug!(
        "crl {}: refreshing every {}",
        context.source.name,
        humantime::format_duration(interval)
    );

    loop {
        context.run_guarded_cycle().await;

        // A dropped sender counts as a stop request too.
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    context
        .logger
        .notice(&format!("crl {}: stop signal received", context.source.name));
    state.send_replace(WorkerState::Stopped);
}
