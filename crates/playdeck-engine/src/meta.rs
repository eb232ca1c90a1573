//! Tag probing for a media locator.
//!
//! Opens the locator, probes the container, and reads the standard tags plus
//! duration. Missing tags stay `None`; transport and probe failures surface
//! as errors the caller logs.

use anyhow::{Context, Result};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey};

use crate::decode::duration_from_params;
use crate::source::open_locator;

/// Tags and stream facts probed from a locator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub duration_ms: Option<u64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

/// Probe `locator` and collect its tags.
pub fn probe_tags(locator: &str) -> Result<TrackTags> {
    let (source, hint) = open_locator(locator, None)?;
    let mss = MediaSourceStream::new(source, Default::default());
    let mut probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("probe {locator}"))?;

    let mut tags = TrackTags::default();

    if let Some(track) = probed.format.default_track() {
        let params = &track.codec_params;
        tags.sample_rate = params.sample_rate;
        tags.channels = params
            .channels
            .map(|c| c.count())
            .and_then(|c| u16::try_from(c).ok());
        tags.duration_ms = duration_from_params(params);
    }

    if let Some(rev) = probed.format.metadata().current() {
        for tag in rev.tags() {
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => {
                    if tags.title.is_none() {
                        tags.title = Some(tag.value.to_string());
                    }
                }
                Some(StandardTagKey::Artist) => {
                    if tags.artist.is_none() {
                        tags.artist = Some(tag.value.to_string());
                    }
                }
                Some(StandardTagKey::Album) => {
                    if tags.album.is_none() {
                        tags.album = Some(tag.value.to_string());
                    }
                }
                Some(StandardTagKey::Genre) => {
                    if tags.genre.is_none() {
                        tags.genre = Some(tag.value.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &std::path::Path, frames: u32, rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn probes_duration_and_spec_from_untagged_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.wav");
        write_test_wav(&path, 22_050, 44_100);

        let tags = probe_tags(path.to_str().unwrap()).unwrap();
        assert_eq!(tags.duration_ms, Some(500));
        assert_eq!(tags.sample_rate, Some(44_100));
        assert_eq!(tags.channels, Some(1));
        assert!(tags.title.is_none());
        assert!(tags.artist.is_none());
    }

    #[test]
    fn probe_of_missing_locator_errors() {
        assert!(probe_tags("/no/such/file.ogg").is_err());
    }
}
