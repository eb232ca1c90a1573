//! Output stage (CPAL stream).
//!
//! Builds the output stream whose real-time callback drains a [`SampleQueue`]
//! without blocking, maps channels (mono/stereo best-effort), and converts
//! `f32` samples to the device sample format. Underruns are filled with
//! silence and counted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use crate::queue::SampleQueue;

/// Knobs for the output callback.
#[derive(Clone)]
pub struct OutputOptions {
    /// Max frames pulled from the queue per refill. Larger values reduce
    /// queue churn at the cost of latency.
    pub refill_max_frames: usize,
    /// While true, the callback outputs silence and does not drain the queue,
    /// so pause never skips ahead.
    pub paused: Arc<AtomicBool>,
    /// Incremented by the number of frames rendered.
    pub played_frames: Arc<AtomicU64>,
    /// Incremented by the number of silent frames inserted on underrun.
    pub underrun_frames: Arc<AtomicU64>,
    /// Incremented once per underrun incident.
    pub underrun_events: Arc<AtomicU64>,
    /// Gauge updated with the queue depth after each refill.
    pub buffered_frames: Arc<AtomicU64>,
}

/// Build a CPAL output stream fed from `queue`.
///
/// The queue must carry interleaved `f32` samples already at the stream's
/// sample rate.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    queue: &Arc<SampleQueue>,
    opts: OutputOptions,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, queue, opts),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, queue, opts),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, queue, opts),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, queue, opts),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: &Arc<SampleQueue>,
    opts: OutputOptions,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;
    let refill_max_frames = opts.refill_max_frames.max(1);

    let state = Arc::new(Mutex::new(RefillState {
        pos: 0,
        src_channels: queue.channels(),
        src: Vec::new(),
    }));

    let queue_cb = queue.clone();
    let paused = opts.paused.clone();
    let played_frames = opts.played_frames.clone();
    let underrun_frames = opts.underrun_frames.clone();
    let underrun_events = opts.underrun_events.clone();
    let buffered_frames = opts.buffered_frames.clone();

    let err_fn = |err| tracing::warn!("stream error: {err}");

    let state_cb = state.clone();
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            if paused.load(Ordering::Relaxed) {
                data.fill(<T as cpal::Sample>::from_sample::<f32>(0.0));
                return;
            }

            let mut st = state_cb.lock().unwrap();
            let frames = data.len() / channels_out;
            let mut filled = 0usize;

            for frame in 0..frames {
                if st.pos >= st.src.len() {
                    st.pos = 0;
                    st.src.clear();
                    match queue_cb.try_pop(refill_max_frames) {
                        Some(v) => {
                            st.src = v;
                            buffered_frames
                                .store(queue_cb.len_frames() as u64, Ordering::Relaxed);
                        }
                        None => {
                            // No audio ready; silence out the rest.
                            underrun_events.fetch_add(1, Ordering::Relaxed);
                            let remaining = frames.saturating_sub(frame);
                            underrun_frames.fetch_add(remaining as u64, Ordering::Relaxed);
                            for idx in (frame * channels_out)..data.len() {
                                data[idx] = <T as cpal::Sample>::from_sample::<f32>(0.0);
                            }
                            break;
                        }
                    }
                }
                for ch in 0..channels_out {
                    let sample = next_sample_mapped(&mut st, channels_out, ch);
                    data[frame * channels_out + ch] =
                        <T as cpal::Sample>::from_sample::<f32>(sample);
                }
                filled += 1;
            }

            if filled > 0 {
                played_frames.fetch_add(filled as u64, Ordering::Relaxed);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Local refill buffer so the callback rarely locks the queue.
struct RefillState {
    pos: usize,
    src_channels: usize,
    src: Vec<f32>,
}

/// One output sample for `dst_ch` with simple channel mapping.
///
/// mono→stereo duplicates, stereo→mono averages, other layouts clamp to the
/// available channels. `st.pos` advances once per destination frame.
fn next_sample_mapped(st: &mut RefillState, dst_channels: usize, dst_ch: usize) -> f32 {
    if st.pos >= st.src.len() {
        return 0.0;
    }

    let frame_start = st.pos;
    let get_src = |ch: usize, st: &RefillState| -> f32 {
        if ch < st.src_channels && frame_start + ch < st.src.len() {
            st.src[frame_start + ch]
        } else {
            0.0
        }
    };

    let out = match (st.src_channels, dst_channels) {
        (1, 1) => get_src(0, st),
        (2, 2) => get_src(dst_ch.min(1), st),
        (2, 1) => 0.5 * (get_src(0, st) + get_src(1, st)),
        (1, 2) => get_src(0, st),
        _ => get_src(dst_ch.min(st.src_channels.saturating_sub(1)), st),
    };

    if dst_ch + 1 == dst_channels {
        st.pos += st.src_channels;
    }
    out
}
