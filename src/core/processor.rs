//! Processing collaborator traits.
//!
//! The crate never touches pixels. A [`GenerationProcessor`] owns the working
//! image and applies one re-encode per call; an [`OffloadedProcessor`] runs a
//! whole batch of re-encodes somewhere else (a worker thread) and reports how
//! far it got.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ProcessError;

/// Image quality relative to the original frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Peak signal-to-noise ratio in dB; infinite for identical frames.
    pub psnr: Option<f64>,
    /// Structural similarity in `[0, 1]`.
    pub ssim: Option<f64>,
}

/// Pixels of a working image handed from one processor to another.
///
/// Produced by the processor behind an offload worker after each batch and
/// adopted by the driver's local processor, so both hold the same decayed frame.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGBA bytes.
    pub rgba: Vec<u8>,
}

/// Applies one generation to the working image.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use decay_playback::core::{GenerationProcessor, ProcessError};
///
/// #[derive(Clone)]
/// struct JpegCanvas { /* working buffer */ }
///
/// #[async_trait]
/// impl GenerationProcessor for JpegCanvas {
///     async fn reencode(&self, quality: f64) -> Result<(), ProcessError> {
///         // encode the working buffer at `quality`, then decode it back in place
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait GenerationProcessor: Send + Sync + 'static {
    /// Re-encode the working image once at `quality` (in `(0, 1]`).
    async fn reencode(&self, quality: f64) -> Result<(), ProcessError>;

    /// Compare the working image against the original. `None` when metrics are
    /// unavailable.
    async fn measure_quality(&self) -> Option<QualityMetrics> {
        None
    }

    /// Restore the working image to the original frame.
    async fn reset_frame(&self) -> Result<(), ProcessError> {
        Ok(())
    }

    /// Copy of the working image. `None` when the processor cannot export it.
    async fn snapshot_frame(&self) -> Option<FrameSnapshot> {
        None
    }

    /// Replace the working image with `frame`.
    async fn adopt_frame(&self, _frame: FrameSnapshot) -> Result<(), ProcessError> {
        Ok(())
    }
}

/// Outcome of an offloaded batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Generations applied before the batch finished or failed.
    pub processed: u32,
    /// Whether a generation failed after exhausting retries.
    pub failed: bool,
    /// Quality of the last applied generation.
    pub last_quality: Option<f64>,
    /// Working image after the batch, for the driver's processor to adopt.
    pub frame: Option<FrameSnapshot>,
}

/// Runs a batch of re-encodes away from the driver's execution context.
#[async_trait]
pub trait OffloadedProcessor: Send + Sync + 'static {
    /// Apply `qualities` in order, stopping at the first generation that fails
    /// `max_retry` times. Errors mean the offload path itself broke.
    ///
    /// When anything was applied, the outcome should carry the resulting
    /// frame; without it the driver's processor falls behind the offloaded copy.
    async fn process(&self, qualities: Vec<f64>, max_retry: u32) -> Result<BatchOutcome, ProcessError>;

    /// Bring the offloaded copy of the working image back to the original.
    async fn resync(&self) -> Result<(), ProcessError>;
}

/// Re-encode once, retrying up to `max_retry` attempts in total.
///
/// Returns `true` on the first success.
pub async fn reencode_with_retry<P>(processor: &P, quality: f64, max_retry: u32) -> bool
where
    P: GenerationProcessor + ?Sized,
{
    let attempts = max_retry.max(1);
    for attempt in 1..=attempts {
        match processor.reencode(quality).await {
            Ok(()) => return true,
            Err(e) => {
                tracing::debug!(attempt, max_retry = attempts, quality, error = %e, "re-encode attempt failed");
            }
        }
    }
    false
}

/// Apply `qualities` in order with retries, stopping at the first failure.
pub async fn run_batch<P>(processor: &P, qualities: &[f64], max_retry: u32) -> BatchOutcome
where
    P: GenerationProcessor + ?Sized,
{
    let mut outcome = BatchOutcome::default();
    for &quality in qualities {
        if !reencode_with_retry(processor, quality, max_retry).await {
            outcome.failed = true;
            break;
        }
        outcome.processed += 1;
        outcome.last_quality = Some(quality);
    }
    outcome
}
