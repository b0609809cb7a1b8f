//! V4L2-backed capture driver using the v4l crate.
//!
//! V4L2's memory-mapped streaming keeps every buffer queued with the kernel
//! and re-queues each one after it is read back, so the submit/wait/fetch/
//! release protocol is imposed by a slot-accounting layer on top: submissions
//! consume virtual slots up to the configured buffer count, payloads are
//! copied out of the mapped buffer on dequeue, and releases return slots for
//! reuse. Statistics are derived counters, as V4L2 exposes no equivalent of a
//! capture-statistics property set.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::stats::StatisticsSnapshot;
use crate::traits::{
    CaptureDriver, CaptureError, CaptureRequest, FrameMetadata, FramePayload, RequestId,
    RequestStatus, Result, SubmitOutcome, WaitOutcome,
};

/// Capture geometry and queue depth used when opening a device.
#[derive(Debug, Clone)]
pub struct V4l2Options {
    /// Number of capture buffers to request from the driver.
    pub buffer_count: u32,
    /// Desired frame width; the device keeps its current width when `None`.
    pub width: Option<u32>,
    /// Desired frame height; the device keeps its current height when `None`.
    pub height: Option<u32>,
}

impl Default for V4l2Options {
    fn default() -> Self {
        Self {
            buffer_count: 4,
            width: None,
            height: None,
        }
    }
}

/// V4L2 implementation of [`CaptureDriver`] wrapping the v4l crate.
pub struct V4l2Driver {
    stream: Stream<'static>,
    card: String,
    capacity: usize,
    queued: usize,
    ready: VecDeque<CaptureRequest>,
    held: Vec<RequestId>,
    next_id: u32,
    started: Instant,
    frames: u64,
    errors: u64,
}

impl V4l2Driver {
    /// Open a V4L2 capture device by index (e.g., 0 for /dev/video0).
    pub fn open(index: u32, options: &V4l2Options) -> Result<Self> {
        let device = Device::new(index as usize).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                CaptureError::DeviceNotFound(index)
            } else {
                CaptureError::DeviceOpenFailed(err.to_string())
            }
        })?;

        let caps = device
            .query_caps()
            .map_err(|err| CaptureError::DeviceOpenFailed(err.to_string()))?;
        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
            || !caps
                .capabilities
                .contains(v4l::capability::Flags::STREAMING)
        {
            return Err(CaptureError::DeviceOpenFailed(format!(
                "{} does not support streaming capture",
                caps.card
            )));
        }

        if options.width.is_some() || options.height.is_some() {
            let mut fmt = device.format().map_err(driver_err)?;
            if let Some(width) = options.width {
                fmt.width = width;
            }
            if let Some(height) = options.height {
                fmt.height = height;
            }
            let fmt = device.set_format(&fmt).map_err(driver_err)?;
            log::info!("device set up to {}x{}", fmt.width, fmt.height);
        }

        let stream =
            Stream::with_buffers(&device, Type::VideoCapture, options.buffer_count)
                .map_err(driver_err)?;
        log::info!(
            "opened {} ({}) with {} buffers",
            caps.card,
            caps.driver,
            options.buffer_count
        );

        Ok(Self {
            stream,
            card: caps.card,
            capacity: options.buffer_count as usize,
            queued: 0,
            ready: VecDeque::new(),
            held: Vec::new(),
            next_id: 0,
            started: Instant::now(),
            frames: 0,
            errors: 0,
        })
    }

    /// Device name, as reported by its capability query.
    #[must_use]
    pub fn card(&self) -> &str {
        &self.card
    }

    fn outstanding(&self) -> usize {
        self.queued + self.ready.len() + self.held.len()
    }
}

impl CaptureDriver for V4l2Driver {
    fn submit_request(&mut self) -> Result<SubmitOutcome> {
        if self.outstanding() >= self.capacity {
            return Ok(SubmitOutcome::PoolFull);
        }
        self.queued += 1;
        Ok(SubmitOutcome::Accepted)
    }

    /// Dequeue the next filled buffer.
    ///
    /// With nothing submitted this sleeps out the timeout like a quiet
    /// device. Otherwise `DQBUF` blocks until the driver fills the next
    /// buffer; on a device that has stopped delivering frames the wait can
    /// exceed `timeout`, since the v4l mmap stream offers no bounded dequeue.
    fn wait_for_completion(&mut self, timeout: Duration) -> Result<WaitOutcome> {
        if self.queued == 0 {
            std::thread::sleep(timeout);
            return Ok(WaitOutcome::TimedOut);
        }

        let (buf, meta) = self.stream.next().map_err(driver_err)?;

        // Safe conversions: V4L2 timestamps are always non-negative in practice
        #[allow(clippy::cast_sign_loss)]
        let secs = meta.timestamp.sec.max(0) as u64;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let nanos = (meta.timestamp.usec.max(0) as u32).saturating_mul(1000);

        let payload = FramePayload {
            data: buf.to_vec(),
            metadata: FrameMetadata {
                sequence: meta.sequence,
                timestamp: Duration::new(secs, nanos),
                bytes_used: meta.bytesused,
            },
        };
        let status = if meta.bytesused == 0 {
            self.errors += 1;
            RequestStatus::Failed {
                reason: format!("empty frame from {}", self.card),
            }
        } else {
            self.frames += 1;
            RequestStatus::Succeeded
        };

        let id = RequestId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.queued = self.queued.saturating_sub(1);
        self.ready.push_back(CaptureRequest::new(id, status, payload));
        Ok(WaitOutcome::Completed(id))
    }

    fn fetch_request(&mut self, id: RequestId) -> Result<CaptureRequest> {
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
        let pos = self
            .held
            .iter()
            .position(|&held| held == id)
            .ok_or(CaptureError::UnknownRequest(id))?;
        self.held.remove(pos);
        Ok(())
    }

    fn reset_pool(&mut self) -> Result<()> {
        self.queued = 0;
        self.ready.clear();
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn statistics(&mut self) -> Result<StatisticsSnapshot> {
        let elapsed = self.started.elapsed().as_secs_f64();
        let frames_per_second = if elapsed > 0.0 {
            self.frames as f64 / elapsed
        } else {
            0.0
        };
        let capture_time_s = if self.frames > 0 {
            elapsed / self.frames as f64
        } else {
            0.0
        };
        Ok(StatisticsSnapshot {
            frames_per_second,
            error_count: self.errors,
            capture_time_s,
        })
    }
}

fn driver_err(err: std::io::Error) -> CaptureError {
    CaptureError::Driver {
        code: err.raw_os_error().unwrap_or(-1),
        message: err.to_string(),
    }
}
