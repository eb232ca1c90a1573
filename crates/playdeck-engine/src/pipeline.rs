//! Pipeline wiring: resample stage + output stream + drain/cancel handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use cpal::traits::StreamTrait;

use crate::config::EngineConfig;
use crate::{playback, queue, resample};

/// Per-session flags and counters shared with the caller.
///
/// The worker that owns a session holds clones of `paused` and `cancel`;
/// the counters feed status snapshots.
pub struct RenderOptions {
    /// Silences output without draining the queue.
    pub paused: Arc<AtomicBool>,
    /// Terminates the render early.
    pub cancel: Arc<AtomicBool>,
    /// Frames rendered so far.
    pub played_frames: Arc<AtomicU64>,
    /// Silent frames inserted on underrun.
    pub underrun_frames: Arc<AtomicU64>,
    /// Underrun incidents.
    pub underrun_events: Arc<AtomicU64>,
    /// Current output queue depth in frames.
    pub buffered_frames: Arc<AtomicU64>,
}

impl RenderOptions {
    /// Fresh flags and zeroed counters for one session.
    pub fn new() -> Self {
        Self {
            paused: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            played_frames: Arc::new(AtomicU64::new(0)),
            underrun_frames: Arc::new(AtomicU64::new(0)),
            underrun_events: Arc::new(AtomicU64::new(0)),
            buffered_frames: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire the resampler (when rates differ) and the output stream, then block
/// until the audio drains or `opts.cancel` is set.
///
/// On cancel the queues are closed and `opts.paused` is set so the device
/// goes silent immediately instead of draining buffered audio.
pub fn render_to_device(
    device: &cpal::Device,
    config: &cpal::SupportedStreamConfig,
    stream_config: &cpal::StreamConfig,
    engine: &EngineConfig,
    src_spec: symphonia::core::audio::SignalSpec,
    srcq: Arc<queue::SampleQueue>,
    opts: &RenderOptions,
) -> Result<()> {
    let srcq_for_cancel = srcq.clone();

    let dst_rate = stream_config.sample_rate;
    let dstq = if src_spec.rate == dst_rate {
        tracing::info!(rate_hz = dst_rate, "resample skipped");
        srcq
    } else {
        let out = resample::spawn_resampler(
            srcq,
            src_spec,
            dst_rate,
            resample::ResampleConfig {
                chunk_frames: engine.chunk_frames,
                buffer_seconds: engine.buffer_seconds,
            },
        )?;
        tracing::info!(from_hz = src_spec.rate, to_hz = dst_rate, "resampling");
        out
    };

    let stream = playback::build_output_stream(
        device,
        stream_config,
        config.sample_format(),
        &dstq,
        playback::OutputOptions {
            refill_max_frames: engine.refill_max_frames,
            paused: opts.paused.clone(),
            played_frames: opts.played_frames.clone(),
            underrun_frames: opts.underrun_frames.clone(),
            underrun_events: opts.underrun_events.clone(),
            buffered_frames: opts.buffered_frames.clone(),
        },
    )?;
    stream.play()?;

    let drained = queue::wait_drained_or_cancel(&dstq, &opts.cancel);
    if !drained {
        opts.paused.store(true, Ordering::Relaxed);
        srcq_for_cancel.close();
        dstq.close();
    }

    // Let the device render its last buffer before the stream drops.
    thread::sleep(Duration::from_millis(100));
    Ok(())
}
