//! Continuous image acquisition over a driver-owned capture-request pool.
//!
//! This library keeps a single capture device permanently supplied with
//! pending requests, retrieves completed buffers with a bounded wait, hands
//! them to a consumer through a double-buffered handoff, samples device
//! statistics periodically, and shuts down cooperatively without leaking
//! driver-owned buffers. The driver seam is trait-based, enabling production
//! use with real V4L2 hardware and deterministic testing with a scripted
//! mock.

pub mod device;
pub mod engine;
pub mod handoff;
pub mod shutdown;
pub mod stats;
pub mod traits;

#[cfg(test)]
pub mod mock;

pub use device::{V4l2Driver, V4l2Options};
pub use engine::{
    AcquisitionEngine, AcquisitionHandle, AcquisitionMode, EngineConfig, EngineReport, EngineState,
    FrameConsumer, DEFAULT_STATS_INTERVAL, DEFAULT_WAIT_TIMEOUT,
};
pub use handoff::DoubleBufferHandoff;
pub use shutdown::StopHandle;
pub use stats::{StatisticsSampler, StatisticsSnapshot};
pub use traits::{
    CaptureDriver, CaptureError, CaptureRequest, FrameMetadata, FramePayload, RequestId,
    RequestStatus, Result, SubmitOutcome, WaitOutcome,
};
