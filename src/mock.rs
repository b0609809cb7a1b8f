//! Scripted mock driver for exercising the acquisition loop without hardware.

use std::collections::VecDeque;
use std::time::Duration;

use crate::shutdown::StopHandle;
use crate::stats::StatisticsSnapshot;
use crate::traits::{
    CaptureDriver, CaptureError, CaptureRequest, FrameMetadata, FramePayload, RequestId,
    RequestStatus, Result, SubmitOutcome, WaitOutcome,
};

/// One scripted outcome for a `wait_for_completion` call.
#[derive(Debug, Clone)]
pub enum WaitScript {
    /// Complete the oldest queued request with the given status.
    Deliver(RequestStatus),
    /// Let the wait time out with no completion.
    TimeOut,
    /// Fail the wait itself with a driver error code.
    Fail(i32),
}

/// Journal entry recording one driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    /// `submit_request` and its outcome.
    Submit(SubmitOutcome),
    /// `wait_for_completion`.
    Wait,
    /// `fetch_request` for the given id.
    Fetch(RequestId),
    /// `release_request` for the given id.
    Release(RequestId),
    /// `reset_pool`.
    Reset,
    /// `statistics`.
    ReadStatistics,
}

/// Mock driver with a bounded slot pool, a wait script, and a call journal.
///
/// Each `Deliver` step completes the oldest queued request under a fresh id,
/// so leak checks can demand that every delivered id is released exactly
/// once. When the script runs dry the mock can flip a [`StopHandle`], letting
/// a test drive the engine for an exact number of iterations.
pub struct MockDriver {
    capacity: usize,
    script: VecDeque<WaitScript>,
    queued: VecDeque<RequestId>,
    ready: VecDeque<CaptureRequest>,
    held: Vec<RequestId>,
    released: Vec<RequestId>,
    delivered: Vec<RequestId>,
    calls: Vec<DriverCall>,
    stop_when_dry: Option<StopHandle>,
    next_id: u32,
    errors: u64,
}

impl MockDriver {
    /// Create a mock with `capacity` request slots and an empty script.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            script: VecDeque::new(),
            queued: VecDeque::new(),
            ready: VecDeque::new(),
            held: Vec::new(),
            released: Vec::new(),
            delivered: Vec::new(),
            calls: Vec::new(),
            stop_when_dry: None,
            next_id: 0,
            errors: 0,
        }
    }

    /// Append wait outcomes to the script.
    #[must_use]
    pub fn with_script(mut self, script: Vec<WaitScript>) -> Self {
        self.script.extend(script);
        self
    }

    /// Signal `stop` once the last scripted wait outcome has been served.
    #[must_use]
    pub fn stop_when_dry(mut self, stop: StopHandle) -> Self {
        self.stop_when_dry = Some(stop);
        self
    }

    /// Every driver call in order.
    #[must_use]
    pub fn calls(&self) -> &[DriverCall] {
        &self.calls
    }

    /// Ids of all requests ever completed, in completion order.
    #[must_use]
    pub fn delivered(&self) -> &[RequestId] {
        &self.delivered
    }

    /// Ids released back to the pool, in release order.
    #[must_use]
    pub fn released(&self) -> &[RequestId] {
        &self.released
    }

    /// Slots currently consumed (queued + completed-unfetched + held).
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.queued.len() + self.ready.len() + self.held.len()
    }

    /// Number of accepted submissions journaled so far.
    #[must_use]
    pub fn accepted_submissions(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, DriverCall::Submit(SubmitOutcome::Accepted)))
            .count()
    }

    /// Number of statistics reads journaled so far.
    #[must_use]
    pub fn statistics_reads(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, DriverCall::ReadStatistics))
            .count()
    }

    /// Number of pool resets journaled so far.
    #[must_use]
    pub fn resets(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, DriverCall::Reset))
            .count()
    }
}

impl CaptureDriver for MockDriver {
    fn submit_request(&mut self) -> Result<SubmitOutcome> {
        let outcome = if self.outstanding() >= self.capacity {
            SubmitOutcome::PoolFull
        } else {
            let id = RequestId(self.next_id);
            self.next_id += 1;
            self.queued.push_back(id);
            SubmitOutcome::Accepted
        };
        self.calls.push(DriverCall::Submit(outcome));
        Ok(outcome)
    }

    fn wait_for_completion(&mut self, timeout: Duration) -> Result<WaitOutcome> {
        self.calls.push(DriverCall::Wait);
        let step = self.script.pop_front();
        if self.script.is_empty() {
            if let Some(stop) = &self.stop_when_dry {
                stop.signal();
            }
        }
        match step {
            Some(WaitScript::Deliver(status)) => {
                let id = self.queued.pop_front().ok_or_else(|| CaptureError::Driver {
                    code: -1,
                    message: "scripted completion with nothing queued".to_owned(),
                })?;
                if !status.is_ok() {
                    self.errors += 1;
                }
                let sequence = u32::try_from(self.delivered.len()).unwrap_or(u32::MAX);
                self.delivered.push(id);
                self.ready
                    .push_back(CaptureRequest::new(id, status, test_payload(sequence)));
                Ok(WaitOutcome::Completed(id))
            }
            Some(WaitScript::TimeOut) | None => {
                // a real wait burns the whole timeout before giving up
                std::thread::sleep(timeout);
                Ok(WaitOutcome::TimedOut)
            }
            Some(WaitScript::Fail(code)) => Err(CaptureError::Driver {
                code,
                message: "scripted wait failure".to_owned(),
            }),
        }
    }

    fn fetch_request(&mut self, id: RequestId) -> Result<CaptureRequest> {
        self.calls.push(DriverCall::Fetch(id));
        let pos = self
            .ready
            .iter()
            .position(|request| request.id() == id)
            .ok_or(CaptureError::UnknownRequest(id))?;
        let request = self
            .ready
            .remove(pos)
            .ok_or(CaptureError::UnknownRequest(id))?;
        self.held.push(id);
        Ok(request)
    }

    fn release_request(&mut self, request: CaptureRequest) -> Result<()> {
        let id = request.id();
        self.calls.push(DriverCall::Release(id));
        let pos = self
            .held
            .iter()
            .position(|&held| held == id)
            .ok_or(CaptureError::UnknownRequest(id))?;
        self.held.remove(pos);
        self.released.push(id);
        Ok(())
    }

    fn reset_pool(&mut self) -> Result<()> {
        self.calls.push(DriverCall::Reset);
        self.queued.clear();
        self.ready.clear();
        Ok(())
    }

    fn statistics(&mut self) -> Result<StatisticsSnapshot> {
        self.calls.push(DriverCall::ReadStatistics);
        Ok(StatisticsSnapshot {
            frames_per_second: 30.0,
            error_count: self.errors,
            capture_time_s: 0.033,
        })
    }
}

/// Fixed-size payload stamped with a sequence number, ~30 fps timestamps.
fn test_payload(sequence: u32) -> FramePayload {
    FramePayload {
        data: vec![0u8; 16],
        metadata: FrameMetadata {
            sequence,
            timestamp: Duration::from_millis(u64::from(sequence) * 33),
            bytes_used: 16,
        },
    }
}

/// A standalone succeeded request for handoff tests.
#[must_use]
pub fn test_request(id: u32) -> CaptureRequest {
    CaptureRequest::new(RequestId(id), RequestStatus::Succeeded, test_payload(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_full_after_capacity_submissions() {
        let mut driver = MockDriver::new(3);
        for _ in 0..3 {
            assert_eq!(
                driver.submit_request().expect("submit should succeed"),
                SubmitOutcome::Accepted
            );
        }
        assert_eq!(
            driver.submit_request().expect("submit should succeed"),
            SubmitOutcome::PoolFull
        );
        assert_eq!(driver.outstanding(), 3);
    }

    #[test]
    fn test_released_slot_becomes_free_again() {
        let mut driver =
            MockDriver::new(1).with_script(vec![WaitScript::Deliver(RequestStatus::Succeeded)]);
        let _ = driver.submit_request().expect("submit should succeed");
        let WaitOutcome::Completed(id) = driver
            .wait_for_completion(Duration::from_millis(1))
            .expect("wait should succeed")
        else {
            unreachable!("scripted completion expected");
        };
        let request = driver.fetch_request(id).expect("fetch should succeed");
        assert_eq!(
            driver.submit_request().expect("submit should succeed"),
            SubmitOutcome::PoolFull
        );
        driver
            .release_request(request)
            .expect("release should succeed");
        assert_eq!(
            driver.submit_request().expect("submit should succeed"),
            SubmitOutcome::Accepted
        );
    }

    #[test]
    fn test_fetch_unknown_id_fails() {
        let mut driver = MockDriver::new(2);
        let err = driver
            .fetch_request(RequestId(9))
            .expect_err("fetch of unknown id should fail");
        assert!(matches!(err, CaptureError::UnknownRequest(RequestId(9))));
    }

    #[test]
    fn test_reset_cancels_queued_requests() {
        let mut driver = MockDriver::new(2);
        let _ = driver.submit_request().expect("submit should succeed");
        let _ = driver.submit_request().expect("submit should succeed");
        driver.reset_pool().expect("reset should succeed");
        assert_eq!(driver.outstanding(), 0);
    }

    #[test]
    fn test_script_dry_signals_stop() {
        let stop = StopHandle::new();
        let mut driver = MockDriver::new(2)
            .with_script(vec![WaitScript::TimeOut])
            .stop_when_dry(stop.clone());
        assert!(!stop.is_signaled());
        let _ = driver
            .wait_for_completion(Duration::from_millis(1))
            .expect("wait should succeed");
        assert!(stop.is_signaled());
    }
}
