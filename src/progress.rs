//! Progress-callback trait for stage and per-slide events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to follow a
//! run as it moves through the pipeline.
//!
//! # Why callbacks instead of channels?
//!
//! The callback is the least-invasive integration point: callers can forward
//! events to a channel, a log, or a terminal progress bar without the library
//! knowing how the host application communicates. The trait is `Send + Sync`
//! because slide inspection runs on several blocking threads at once.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pptx2png::{ConversionConfig, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct OverflowCounter {
//!     overflowing: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for OverflowCounter {
//!     fn on_slide_checked(&self, slide: usize, total: usize, overflowing: bool) {
//!         if overflowing {
//!             self.overflowing.fetch_add(1, Ordering::SeqCst);
//!             eprintln!("slide {}/{} overflows", slide, total);
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(OverflowCounter { overflowing: AtomicUsize::new(0) });
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use std::sync::Arc;

/// Called by the pipeline as it runs.
///
/// All methods have no-op defaults so implementors override only what they
/// need. `on_slide_checked` may be called concurrently and out of slide order.
pub trait ConversionProgressCallback: Send + Sync {
    /// A pipeline stage is about to run.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// A pipeline stage finished successfully.
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// One padded render was inspected.
    ///
    /// # Arguments
    /// * `slide`      : 1-based slide index
    /// * `total`      : slides in the deck
    /// * `overflowing`: whether any margin failed
    fn on_slide_checked(&self, slide: usize, total: usize, overflowing: bool) {
        let _ = (slide, total, overflowing);
    }

    /// The run finished.
    fn on_conversion_complete(&self, total_slides: usize, overflowing_slides: usize) {
        let _ = (total_slides, overflowing_slides);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Tracking {
        stages: Mutex<Vec<Stage>>,
        checked: AtomicUsize,
        overflowing: AtomicUsize,
    }

    impl ConversionProgressCallback for Tracking {
        fn on_stage_start(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_slide_checked(&self, _slide: usize, _total: usize, overflowing: bool) {
            self.checked.fetch_add(1, Ordering::SeqCst);
            if overflowing {
                self.overflowing.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Padding);
        cb.on_stage_complete(Stage::Padding, 3);
        cb.on_slide_checked(1, 2, true);
        cb.on_conversion_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = Arc::new(Tracking::default());
        let cb: ProgressCallback = tracker.clone();

        cb.on_stage_start(Stage::Rasterize);
        cb.on_stage_start(Stage::Inspect);
        cb.on_slide_checked(1, 3, false);
        cb.on_slide_checked(2, 3, true);
        cb.on_slide_checked(3, 3, false);

        assert_eq!(*tracker.stages.lock().unwrap(), [Stage::Rasterize, Stage::Inspect]);
        assert_eq!(tracker.checked.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.overflowing.load(Ordering::SeqCst), 1);
    }
}
