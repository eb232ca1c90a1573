//! Streaming resample stage.
//!
//! Converts decoded interleaved `f32` audio from the source rate to the
//! output device rate with Rubato. Runs on its own thread between two bounded
//! [`SampleQueue`]s; when the input queue closes and drains, the output queue
//! is closed too.

use std::sync::Arc;
use std::thread;

use anyhow::Result;
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};
use symphonia::core::audio::SignalSpec;

use crate::queue::{SampleQueue, capacity_for};

/// Configuration for the resampler stage.
#[derive(Clone, Copy, Debug)]
pub struct ResampleConfig {
    /// Input chunk size in frames for the steady-state loop.
    pub chunk_frames: usize,
    /// Buffering target in seconds for the output queue.
    pub buffer_seconds: f32,
}

/// Spawn the resampler thread.
///
/// Reads from `srcq` at `src_spec.rate` and writes samples at `dst_rate` into
/// the returned queue.
pub fn spawn_resampler(
    srcq: Arc<SampleQueue>,
    src_spec: SignalSpec,
    dst_rate: u32,
    cfg: ResampleConfig,
) -> Result<Arc<SampleQueue>> {
    let src_rate = src_spec.rate;
    let channels = src_spec.channels.count();

    let dstq = Arc::new(SampleQueue::new(
        channels,
        capacity_for(dst_rate, channels, cfg.buffer_seconds),
    ));

    let ratio = dst_rate as f64 / src_rate as f64;
    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };
    let chunk_frames = cfg.chunk_frames.max(1);

    let dstq_thread = dstq.clone();
    thread::spawn(move || {
        let mut resampler: Box<dyn Resampler<f32>> = match Async::<f32>::new_sinc(
            ratio,
            1.1,
            &params,
            chunk_frames,
            channels,
            FixedAsync::Input,
        ) {
            Ok(r) => Box::new(r),
            Err(e) => {
                tracing::error!("resampler init error: {e:#}");
                dstq_thread.close();
                return;
            }
        };

        let mut out = vec![0.0f32; channels * chunk_frames * 3];

        // Steady state: full chunks. Tail: whatever remains after close.
        loop {
            let Some(chunk) = srcq.pop_exact(chunk_frames) else {
                break;
            };
            if !process_chunk(
                resampler.as_mut(),
                &chunk,
                chunk_frames,
                None,
                channels,
                &mut out,
                &dstq_thread,
            ) {
                dstq_thread.close();
                return;
            }
        }

        while let Some(tail) = srcq.pop_up_to(chunk_frames) {
            let tail_frames = tail.len() / channels;
            if tail_frames == 0 {
                continue;
            }
            if !process_chunk(
                resampler.as_mut(),
                &tail,
                tail_frames,
                Some(tail_frames),
                channels,
                &mut out,
                &dstq_thread,
            ) {
                break;
            }
        }

        dstq_thread.close();
    });

    Ok(dstq)
}

/// Run one resampler pass; returns `false` on unrecoverable errors.
fn process_chunk(
    resampler: &mut dyn Resampler<f32>,
    input: &[f32],
    input_frames: usize,
    partial_len: Option<usize>,
    channels: usize,
    out: &mut [f32],
    dstq: &Arc<SampleQueue>,
) -> bool {
    let input_adapter = match InterleavedSlice::new(input, channels, input_frames) {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("interleaved slice (input) error: {e:#}");
            return false;
        }
    };

    let out_capacity_frames = out.len() / channels;
    let mut output_adapter = match InterleavedSlice::new_mut(&mut *out, channels, out_capacity_frames)
    {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("interleaved slice (output) error: {e:#}");
            return false;
        }
    };

    let indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len,
    };

    let (_consumed, produced_frames) =
        match resampler.process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing)) {
            Ok(x) => x,
            Err(e) => {
                tracing::error!("resampler process error: {e:#}");
                return false;
            }
        };

    let produced_samples = produced_frames * channels;
    if produced_samples > 0 {
        dstq.push_blocking(&out[..produced_samples]);
    }
    true
}
