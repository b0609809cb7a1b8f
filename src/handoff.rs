//! Double-buffered handoff of completed requests.
//!
//! A consumer always has one stable, previously completed frame to read while
//! a newer one is being produced. Holding the frame before the current one
//! means the current frame can be compared against it, or a display can keep
//! repainting it, without the driver overwriting the memory underneath.

use crate::traits::CaptureRequest;

/// Holds the two most recently completed requests: `current` and `previous`.
///
/// Single-writer: only the capture thread calls [`advance`](Self::advance),
/// so no locking is needed. At most two requests are ever held; everything
/// older is evicted exactly once for the caller to release.
#[derive(Debug, Default)]
pub struct DoubleBufferHandoff {
    current: Option<CaptureRequest>,
    previous: Option<CaptureRequest>,
}

impl DoubleBufferHandoff {
    /// Create an empty handoff.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: None,
            previous: None,
        }
    }

    /// Rotate in the next completed request.
    ///
    /// The old `current` becomes `previous`; the old `previous`, if any, is
    /// returned and must be released back to the driver by the caller.
    #[must_use]
    pub fn advance(&mut self, next: CaptureRequest) -> Option<CaptureRequest> {
        let evicted = self.previous.take();
        self.previous = self.current.take();
        self.current = Some(next);
        evicted
    }

    /// The most recently completed request, stable until the next advance.
    #[must_use]
    pub const fn current(&self) -> Option<&CaptureRequest> {
        self.current.as_ref()
    }

    /// The request that was `current` immediately before the last advance.
    #[must_use]
    pub const fn previous(&self) -> Option<&CaptureRequest> {
        self.previous.as_ref()
    }

    /// Number of requests currently held (0, 1 or 2).
    #[must_use]
    pub fn held(&self) -> usize {
        usize::from(self.current.is_some()) + usize::from(self.previous.is_some())
    }

    /// Remove and return everything still held, oldest first.
    ///
    /// Called once at shutdown so the last one or two buffers can be released
    /// before the pool is reset.
    pub fn drain(&mut self) -> Vec<CaptureRequest> {
        self.previous
            .take()
            .into_iter()
            .chain(self.current.take())
            .collect()
    }
}
