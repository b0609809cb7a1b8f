//! Core types and the driver-facing trait for request-based acquisition.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::stats::StatisticsSnapshot;

/// Identity of one driver-owned capture-request slot.
///
/// Ids are minted by the driver and only ever enter application code through
/// [`WaitOutcome::Completed`]; the acquisition core treats them as opaque
/// handles into the driver's request pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u32);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Completion result of a capture request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStatus {
    /// The driver filled the buffer with a complete frame.
    Succeeded,
    /// The driver gave up on this request; the payload must not be used.
    Failed {
        /// Driver-supplied description of what went wrong.
        reason: String,
    },
}

impl RequestStatus {
    /// `true` when the request completed with a usable frame.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Metadata for a captured frame.
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Frame sequence number.
    pub sequence: u32,
    /// Capture timestamp.
    pub timestamp: Duration,
    /// Actual bytes used in the frame buffer.
    pub bytes_used: u32,
}

/// Image payload of a completed request.
///
/// Opaque to the acquisition core: it is carried to the consumer without
/// being inspected or decoded.
#[derive(Debug, Clone)]
pub struct FramePayload {
    /// Raw frame data.
    pub data: Vec<u8>,
    /// Frame metadata.
    pub metadata: FrameMetadata,
}

/// One completed capture request, held by the application until released.
///
/// Deliberately neither `Clone` nor `Copy`: a `CaptureRequest` value existing
/// in application code *is* the application-held ownership state, and
/// [`CaptureDriver::release_request`] consumes the value, so a request cannot
/// be released twice.
#[derive(Debug)]
pub struct CaptureRequest {
    id: RequestId,
    status: RequestStatus,
    payload: FramePayload,
}

impl CaptureRequest {
    /// Assemble a completed request. Called by driver implementations only.
    #[must_use]
    pub const fn new(id: RequestId, status: RequestStatus, payload: FramePayload) -> Self {
        Self {
            id,
            status,
            payload,
        }
    }

    /// The slot this request occupies in the driver's pool.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// How the driver finished this request.
    #[must_use]
    pub const fn status(&self) -> &RequestStatus {
        &self.status
    }

    /// The captured frame.
    #[must_use]
    pub const fn payload(&self) -> &FramePayload {
        &self.payload
    }
}

/// Outcome of a submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The request entered the driver's capture queue.
    Accepted,
    /// Every slot is already submitted or held; the pool is at capacity.
    /// This is the expected steady state, not an error.
    PoolFull,
}

/// Outcome of a bounded wait for the next completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The driver finished the identified request.
    Completed(RequestId),
    /// The timeout elapsed with nothing completed. Normal under a quiet or
    /// slow device.
    TimedOut,
}

/// Error type for acquisition operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Device with the given index was not found.
    #[error("device {0} not found")]
    DeviceNotFound(u32),
    /// Failed to open the device.
    #[error("failed to open device: {0}")]
    DeviceOpenFailed(String),
    /// A driver call failed.
    #[error("driver call failed (code {code}): {message}")]
    Driver {
        /// Driver-level error code.
        code: i32,
        /// Human-readable description.
        message: String,
    },
    /// The referenced request is not currently fetchable or held.
    #[error("request {0} is not held by the driver")]
    UnknownRequest(RequestId),
    /// The capture thread panicked before reporting back.
    #[error("capture thread panicked")]
    ThreadPanicked,
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for acquisition operations.
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Driver function-interface for one opened capture device.
///
/// Implementations own a finite pool of request slots which the driver cycles
/// through. The acquisition core only ever acquires a request between a
/// completed wait and the matching release, and must eventually return every
/// slot; it never opens or closes the underlying device handle.
pub trait CaptureDriver {
    /// Place one capture request into the driver's queue.
    fn submit_request(&mut self) -> Result<SubmitOutcome>;

    /// Block until the next request completes, or until `timeout` elapses.
    fn wait_for_completion(&mut self, timeout: Duration) -> Result<WaitOutcome>;

    /// Take ownership of a completed request by id.
    fn fetch_request(&mut self, id: RequestId) -> Result<CaptureRequest>;

    /// Return a held request's slot to the driver. The payload becomes stale
    /// and may be overwritten by a later capture.
    fn release_request(&mut self, request: CaptureRequest) -> Result<()>;

    /// Cancel all submitted-but-incomplete requests and return their slots.
    /// Safe to call when the pool is already empty.
    fn reset_pool(&mut self) -> Result<()>;

    /// Read the device's live counters. Read-only with respect to capture
    /// state.
    fn statistics(&mut self) -> Result<StatisticsSnapshot>;
}
