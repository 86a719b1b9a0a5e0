use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop flag shared by the capture, detection and render loops.
///
/// Each loop checks it at the top of every iteration, so shutdown latency is
/// bounded by one iteration of the slowest loop.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns true only for the call that flipped it.
    pub fn raise(&self) -> bool {
        !self.raised.swap(true, Ordering::SeqCst)
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_is_idempotent_and_shared() {
        let stop = StopSignal::new();
        let other = stop.clone();
        assert!(!other.is_raised());
        assert!(stop.raise());
        assert!(!stop.raise());
        assert!(other.is_raised());
    }
}
