//! Cooperative termination and end-of-run drain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::handoff::DoubleBufferHandoff;
use crate::traits::{CaptureDriver, Result};

/// Cloneable stop signal shared between a controller and the capture thread.
///
/// Signaling never blocks and never interrupts an in-flight wait; the capture
/// loop notices the flag at its next iteration boundary, so shutdown latency
/// is bounded by the configured wait timeout plus one iteration.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// Create an unsignaled handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination. Idempotent and callable from any thread.
    pub fn signal(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// `true` once termination has been requested.
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Release everything the handoff still holds, then reset the request pool.
///
/// Release failures are reported and do not stop the drain; the pool reset
/// still runs, and it is safe when the pool is already empty. Returns the
/// result of the reset itself.
pub fn drain_and_reset<D: CaptureDriver>(
    driver: &mut D,
    handoff: &mut DoubleBufferHandoff,
) -> Result<()> {
    for request in handoff.drain() {
        let id = request.id();
        if let Err(err) = driver.release_request(request) {
            log::warn!("failed to release request {id} during drain: {err}");
        }
    }
    driver.reset_pool()
}
