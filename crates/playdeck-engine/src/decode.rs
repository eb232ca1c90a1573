//! Streaming decode stage.
//!
//! Probes a container with Symphonia, then decodes packets into interleaved
//! `f32` samples on a background thread, pushing them into a bounded
//! [`SampleQueue`]. The queue is closed on end of stream or on error; the
//! `failed` flag distinguishes the two for end-reason reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Result, anyhow};
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::queue::{SampleQueue, capacity_for};

/// Source details captured while probing.
#[derive(Clone, Debug, Default)]
pub struct SourceDetails {
    /// Codec label (best-effort).
    pub codec: Option<String>,
    /// Container/extension label (best-effort).
    pub container: Option<String>,
}

/// A running decode stage.
pub struct DecodeStart {
    /// Signal spec of the decoded stream.
    pub spec: SignalSpec,
    /// Queue the decode thread pushes into.
    pub queue: Arc<SampleQueue>,
    /// Total duration in milliseconds, when the container reports one.
    pub duration_ms: Option<u64>,
    /// Probed source details.
    pub details: SourceDetails,
    /// Set when the decode thread stopped on an error rather than end of
    /// stream.
    pub failed: Arc<AtomicBool>,
}

/// Probe `source` and spawn the background decode thread.
///
/// `buffer_seconds` sizes the bounded output queue. The thread closes the
/// queue when it stops, whatever the cause.
pub fn spawn_decoder(
    source: Box<dyn MediaSource>,
    hint: Hint,
    buffer_seconds: f32,
) -> Result<DecodeStart> {
    let mss = MediaSourceStream::new(source, Default::default());
    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no default audio track"))?;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| anyhow!("unknown channel layout"))?;
    let rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("unknown sample rate"))?;
    let spec = SignalSpec::new(rate, channels);

    let codec_params = track.codec_params.clone();
    let duration_ms = duration_from_params(&codec_params);
    let details = SourceDetails {
        codec: codec_label(&codec_params),
        container: None,
    };

    let queue = Arc::new(SampleQueue::new(
        channels.count(),
        capacity_for(rate, channels.count(), buffer_seconds),
    ));
    let failed = Arc::new(AtomicBool::new(false));

    let queue_thread = queue.clone();
    let failed_thread = failed.clone();
    thread::spawn(move || {
        if let Err(e) = decode_loop(format, codec_params, &queue_thread) {
            tracing::error!("decode thread error: {e:#}");
            failed_thread.store(true, Ordering::Relaxed);
        }
        queue_thread.close();
    });

    Ok(DecodeStart {
        spec,
        queue,
        duration_ms,
        details,
        failed,
    })
}

/// Decode packets until end of stream, pushing interleaved `f32` samples.
fn decode_loop(
    mut format: Box<dyn symphonia::core::formats::FormatReader>,
    codec_params: CodecParameters,
    queue: &Arc<SampleQueue>,
) -> Result<()> {
    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Recoverable per-packet decode errors are skipped.
            Err(_) => continue,
        };

        let mut buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        buf.copy_interleaved_ref(decoded);
        queue.push_blocking(buf.samples());
    }

    Ok(())
}

/// Best-effort duration in milliseconds from codec metadata.
pub(crate) fn duration_from_params(params: &CodecParameters) -> Option<u64> {
    let frames = params.n_frames?;
    let rate = params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / rate)
}

/// Codec label used in status payloads.
fn codec_label(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_OPUS => "OPUS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use symphonia::core::codecs::*;

    fn write_test_wav(path: &std::path::Path, frames: u32, rate: u32, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for n in 0..(frames * channels as u32) {
            let v = ((n % 128) as i16) * 64;
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn duration_from_params_handles_zero_rate() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(0);
        params.n_frames = Some(100);
        assert!(duration_from_params(&params).is_none());
    }

    #[test]
    fn duration_from_params_computes() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(48_000);
        params.n_frames = Some(96_000);
        assert_eq!(duration_from_params(&params), Some(2000));
    }

    #[test]
    fn codec_label_maps_known_codecs() {
        let mut params = CodecParameters::new();
        params.codec = CODEC_TYPE_VORBIS;
        assert_eq!(codec_label(&params), Some("VORBIS".to_string()));
        params.codec = CODEC_TYPE_PCM_S16LE;
        assert_eq!(codec_label(&params), Some("PCM_S16".to_string()));
        assert!(codec_label(&CodecParameters::new()).is_none());
    }

    #[test]
    fn decodes_generated_wav_to_expected_sample_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 4410, 44_100, 2);

        let file = File::open(&path).unwrap();
        let mut hint = Hint::new();
        hint.with_extension("wav");
        let start = spawn_decoder(Box::new(file), hint, 0.5).unwrap();

        assert_eq!(start.spec.rate, 44_100);
        assert_eq!(start.spec.channels.count(), 2);
        assert_eq!(start.duration_ms, Some(100));

        let mut total = 0usize;
        while let Some(chunk) = start.queue.pop_up_to(1024) {
            total += chunk.len();
        }
        assert_eq!(total, 4410 * 2);
        assert!(!start.failed.load(Ordering::Relaxed));
    }

    #[test]
    fn probe_of_garbage_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"not a wav at all").unwrap();
        drop(f);

        let file = File::open(&path).unwrap();
        let mut hint = Hint::new();
        hint.with_extension("wav");
        assert!(spawn_decoder(Box::new(file), hint, 0.5).is_err());
    }
}
