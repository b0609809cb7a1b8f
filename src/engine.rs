//! The acquisition engine: a submit/wait/process/resubmit loop around one
//! capture device.
//!
//! The engine keeps the driver's request pool saturated, retrieves completed
//! buffers with a bounded wait, rotates them through the double-buffer
//! handoff, samples device statistics on a cadence of successful frames, and
//! drains everything back to the driver on cooperative shutdown. Per-iteration
//! faults are reported and absorbed; once running, the loop only ends through
//! its stop signal (or after one completion in single-shot mode).

use std::thread;
use std::time::Duration;

use crate::handoff::DoubleBufferHandoff;
use crate::shutdown::{self, StopHandle};
use crate::stats::StatisticsSampler;
use crate::traits::{
    CaptureDriver, CaptureError, CaptureRequest, RequestId, RequestStatus, Result, SubmitOutcome,
    WaitOutcome,
};

/// Default bounded wait for the next completion.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

/// Default statistics cadence, in successful completions.
pub const DEFAULT_STATS_INTERVAL: u64 = 100;

/// How the engine schedules capture requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionMode {
    /// Keep the pool saturated and run until stopped.
    #[default]
    Continuous,
    /// Submit one request, process one completion, then stop.
    SingleShot,
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on one wait for a completion.
    pub wait_timeout: Duration,
    /// Emit a statistics snapshot every this many successful completions;
    /// zero disables sampling.
    pub stats_interval: u64,
    /// Continuous or single-shot scheduling.
    pub mode: AcquisitionMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            stats_interval: DEFAULT_STATS_INTERVAL,
            mode: AcquisitionMode::Continuous,
        }
    }
}

/// Lifecycle of the engine. Mutated only by the capture thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, not yet run.
    Idle,
    /// Inside the acquisition loop.
    Running,
    /// Loop exited; releasing held buffers and resetting the pool.
    Draining,
    /// Drain finished; the driver owns every slot again.
    Stopped,
}

/// Totals from a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineReport {
    /// Requests that completed with a usable frame.
    pub frames_completed: u64,
    /// Requests the driver finished with an error.
    pub frames_failed: u64,
    /// Accepted submissions, prefill included.
    pub requests_submitted: u64,
    /// Waits that elapsed without a completion.
    pub wait_timeouts: u64,
}

/// Same-thread consumer of completed frames.
///
/// Invoked after each successful completion with the current request and,
/// once available, the one completed immediately before it. Both stay valid
/// until the next completion is rotated in.
pub type FrameConsumer = Box<dyn FnMut(&CaptureRequest, Option<&CaptureRequest>) + Send>;

/// Drives the request lifecycle for exactly one device until told to stop.
pub struct AcquisitionEngine<D> {
    driver: D,
    config: EngineConfig,
    sampler: StatisticsSampler,
    state: EngineState,
    stop: StopHandle,
    handoff: DoubleBufferHandoff,
    consumer: Option<FrameConsumer>,
    in_flight: usize,
    report: EngineReport,
}

impl<D: CaptureDriver> AcquisitionEngine<D> {
    /// Wrap an opened driver. The engine never closes the underlying device.
    #[must_use]
    pub fn new(driver: D, config: EngineConfig) -> Self {
        let sampler = StatisticsSampler::new(config.stats_interval);
        Self {
            driver,
            config,
            sampler,
            state: EngineState::Idle,
            stop: StopHandle::new(),
            handoff: DoubleBufferHandoff::new(),
            consumer: None,
            in_flight: 0,
            report: EngineReport::default(),
        }
    }

    /// Install a frame consumer.
    #[must_use]
    pub fn with_consumer<F>(mut self, consumer: F) -> Self
    where
        F: FnMut(&CaptureRequest, Option<&CaptureRequest>) + Send + 'static,
    {
        self.consumer = Some(Box::new(consumer));
        self
    }

    /// Share an externally created stop signal instead of the engine's own.
    #[must_use]
    pub fn with_stop(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// A stop signal for this engine; cloneable and usable from any thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Borrow the wrapped driver.
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Unwrap the driver, discarding the engine.
    #[must_use]
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Run the acquisition loop on the calling thread until stopped.
    ///
    /// Per-iteration faults are reported and absorbed; this never returns
    /// early because of them. Returns the run totals once the drain has
    /// finished. Calling it again on a finished engine is a no-op.
    pub fn run(&mut self) -> EngineReport {
        if self.state != EngineState::Idle {
            log::warn!("acquisition engine already ran; ignoring");
            return self.report;
        }
        self.state = EngineState::Running;
        self.prefill();

        while !self.stop.is_signaled() {
            self.iterate();
            if self.config.mode == AcquisitionMode::SingleShot
                && self.report.frames_completed + self.report.frames_failed > 0
            {
                self.stop.signal();
            }
        }

        self.state = EngineState::Draining;
        log::debug!("draining with {} requests outstanding", self.in_flight);
        if let Err(err) = shutdown::drain_and_reset(&mut self.driver, &mut self.handoff) {
            log::error!("failed to reset the request pool: {err}");
        }
        self.in_flight = 0;
        self.state = EngineState::Stopped;
        log::info!(
            "acquisition stopped: {} frames completed, {} failed",
            self.report.frames_completed,
            self.report.frames_failed
        );
        self.report
    }

    /// Fill the driver's queue before entering the loop. Pool-full is the
    /// expected outcome, not an error.
    fn prefill(&mut self) {
        let before = self.report.requests_submitted;
        match self.config.mode {
            AcquisitionMode::SingleShot => {
                let _ = self.submit_one();
            }
            AcquisitionMode::Continuous => {
                while self.submit_one() {}
            }
        }
        let submitted = self.report.requests_submitted - before;
        log::info!(
            "{submitted} buffer{} requested",
            if submitted == 1 { "" } else { "s" }
        );
    }

    /// Submit one request; returns `true` only when it was accepted.
    fn submit_one(&mut self) -> bool {
        match self.driver.submit_request() {
            Ok(SubmitOutcome::Accepted) => {
                self.in_flight += 1;
                self.report.requests_submitted += 1;
                true
            }
            Ok(SubmitOutcome::PoolFull) => false,
            Err(err) => {
                log::warn!("'submit_request' returned with an unexpected result: {err}");
                false
            }
        }
    }

    /// One pass of the loop: bounded wait, then route whatever came back.
    fn iterate(&mut self) {
        match self.driver.wait_for_completion(self.config.wait_timeout) {
            Ok(WaitOutcome::Completed(id)) => self.process_completion(id),
            Ok(WaitOutcome::TimedOut) => {
                // normal when the device is slower than the timeout or not
                // triggered yet
                self.report.wait_timeouts += 1;
            }
            Err(err) => {
                // a single wait failure never terminates the loop
                log::warn!("'wait_for_completion' failed: {err}");
            }
        }
    }

    /// Fetch a completed request, report it, rotate the handoff, resubmit.
    fn process_completion(&mut self, id: RequestId) {
        let request = match self.driver.fetch_request(id) {
            Ok(request) => request,
            Err(err) => {
                log::warn!("failed to fetch completed request {id}: {err}");
                return;
            }
        };
        self.in_flight = self.in_flight.saturating_sub(1);

        let succeeded = request.status().is_ok();
        match request.status() {
            RequestStatus::Succeeded => {
                self.report.frames_completed += 1;
                if self.sampler.due(self.report.frames_completed) {
                    match self.driver.statistics() {
                        Ok(snapshot) => {
                            self.sampler.emit(self.report.frames_completed, &snapshot);
                        }
                        Err(err) => log::warn!("failed to read device statistics: {err}"),
                    }
                }
            }
            RequestStatus::Failed { reason } => {
                self.report.frames_failed += 1;
                log::warn!("request {id} failed: {reason}");
            }
        }

        // completed or not, the request rotates through the handoff so the
        // oldest held buffer goes back to the driver
        if let Some(evicted) = self.handoff.advance(request) {
            let evicted_id = evicted.id();
            if let Err(err) = self.driver.release_request(evicted) {
                log::warn!("failed to release request {evicted_id}: {err}");
            }
        }

        if succeeded {
            if let Some(consumer) = self.consumer.as_mut() {
                if let Some(current) = self.handoff.current() {
                    consumer(current, self.handoff.previous());
                }
            }
        }

        if self.config.mode == AcquisitionMode::Continuous {
            let _ = self.submit_one();
        }
    }
}

impl<D: CaptureDriver + Send + 'static> AcquisitionEngine<D> {
    /// Move the engine onto a dedicated capture thread.
    ///
    /// Spawning consumes the engine, so a run can only be started once. The
    /// returned handle is the controller's side of the pair: signal stop,
    /// then join for the report.
    pub fn spawn(self) -> Result<AcquisitionHandle> {
        let stop = self.stop.clone();
        let mut engine = self;
        let thread = thread::Builder::new()
            .name("capture".to_owned())
            .spawn(move || engine.run())?;
        Ok(AcquisitionHandle { stop, thread })
    }
}

/// Controller-side handle to a running capture thread.
pub struct AcquisitionHandle {
    stop: StopHandle,
    thread: thread::JoinHandle<EngineReport>,
}

impl AcquisitionHandle {
    /// The stop signal driving this engine.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Request cooperative termination; returns immediately. The loop exits
    /// at its next iteration boundary, at latest one wait timeout away.
    pub fn signal_stop(&self) {
        self.stop.signal();
    }

    /// Block until the capture thread has drained and reset the pool.
    pub fn join(self) -> Result<EngineReport> {
        self.thread
            .join()
            .map_err(|_| CaptureError::ThreadPanicked)
    }
}
