//! Locator handling: classify a fetch locator and open it as a Symphonia
//! [`MediaSource`].
//!
//! Locators starting with `http://` or `https://` stream over HTTP range
//! requests; everything else is treated as a local file path.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use symphonia::core::io::MediaSource;
use symphonia::core::probe::Hint;

/// A classified fetch locator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Locator {
    /// Remote source fetched with HTTP range requests.
    Http(String),
    /// Local filesystem path.
    File(PathBuf),
}

impl Locator {
    /// Classify a raw locator string. Total: every string maps to a variant.
    pub fn parse(raw: &str) -> Locator {
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Locator::Http(raw.to_string())
        } else {
            Locator::File(PathBuf::from(raw))
        }
    }
}

/// Open a locator as a media source plus a format hint.
///
/// The optional `cancel` flag is honored by the HTTP source: once set, reads
/// return zero bytes so the decoder winds down quickly.
pub fn open_locator(
    raw: &str,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<(Box<dyn MediaSource>, Hint)> {
    let mut hint = Hint::new();
    if let Some(ext) = ext_hint_for(raw) {
        hint.with_extension(&ext);
    }
    match Locator::parse(raw) {
        Locator::Http(url) => {
            let source = HttpRangeSource::new(url, HttpRangeConfig::default(), cancel);
            Ok((Box::new(source), hint))
        }
        Locator::File(path) => {
            let file = File::open(&path).with_context(|| format!("open {:?}", path))?;
            Ok((Box::new(file), hint))
        }
    }
}

/// Infer a lowercase extension hint from a locator, ignoring query strings.
pub fn ext_hint_for(locator: &str) -> Option<String> {
    let tail = locator.split('?').next().unwrap_or(locator);
    let file = tail.rsplit('/').next().unwrap_or(tail);
    let mut parts = file.rsplit('.');
    let ext = parts.next()?;
    if parts.next().is_some() && !ext.is_empty() {
        Some(ext.to_ascii_lowercase())
    } else {
        None
    }
}

/// Configuration for HTTP range fetching.
#[derive(Clone, Debug)]
pub struct HttpRangeConfig {
    /// Bytes per fetched block.
    pub block_size: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HttpRangeConfig {
    fn default() -> Self {
        Self {
            block_size: 512 * 1024,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Buffered HTTP range reader implementing [`MediaSource`].
///
/// Keeps one block in memory; seeks outside the block trigger a refetch at
/// the new position.
pub struct HttpRangeSource {
    url: String,
    config: HttpRangeConfig,
    pos: u64,
    len: Option<u64>,
    buf: Vec<u8>,
    buf_start: u64,
    cancel: Option<Arc<AtomicBool>>,
}

impl HttpRangeSource {
    pub fn new(url: String, config: HttpRangeConfig, cancel: Option<Arc<AtomicBool>>) -> Self {
        Self {
            url,
            config,
            pos: 0,
            len: None,
            buf: Vec::new(),
            buf_start: 0,
            cancel,
        }
    }

    fn is_canceled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Learn the total length with a one-byte range probe.
    fn ensure_len(&mut self) -> io::Result<u64> {
        if let Some(len) = self.len {
            return Ok(len);
        }
        let (data, len) = self.fetch_range(0, 0)?;
        let len = len
            .ok_or_else(|| io::Error::other("content length unavailable"))?;
        self.buf_start = 0;
        self.buf = data;
        self.len = Some(len);
        Ok(len)
    }

    fn fetch_range(&self, start: u64, end: u64) -> io::Result<(Vec<u8>, Option<u64>)> {
        let range = format!("bytes={start}-{end}");
        let started = std::time::Instant::now();
        let resp = ureq::get(&self.url)
            .config()
            .timeout_per_call(Some(self.config.timeout))
            .build()
            .header("Range", &range)
            .call()
            .map_err(|e| io::Error::other(format!("http range request failed: {e}")))?;
        let elapsed = started.elapsed();

        let status = resp.status();
        let content_range = resp
            .headers()
            .get("Content-Range")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let content_length = resp
            .headers()
            .get("Content-Length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let mut buf = Vec::new();
        let (_, body) = resp.into_parts();
        body.into_reader()
            .read_to_end(&mut buf)
            .map_err(|e| io::Error::other(format!("http read failed: {e}")))?;
        if elapsed > Duration::from_millis(250) {
            tracing::warn!(
                took_ms = elapsed.as_millis() as u64,
                bytes = buf.len(),
                range = range.as_str(),
                "http range fetch slow"
            );
        }

        let len = match status {
            ureq::http::StatusCode::PARTIAL_CONTENT => content_range
                .as_deref()
                .and_then(parse_content_range_total)
                .or(content_length),
            ureq::http::StatusCode::OK => content_length,
            _ => None,
        };

        Ok((buf, len))
    }

    /// Refill the block buffer starting at the current position.
    fn refill(&mut self) -> io::Result<()> {
        if self.is_canceled() {
            return Ok(());
        }
        let start = self.pos;
        let mut end = start
            .saturating_add(self.config.block_size as u64)
            .saturating_sub(1);
        if let Some(len) = self.len {
            if len > 0 {
                end = end.min(len.saturating_sub(1));
            }
        }
        let (buf, len) = self.fetch_range(start, end)?;
        if let Some(total) = len {
            self.len = Some(total);
        }
        self.buf = buf;
        self.buf_start = start;
        Ok(())
    }
}

impl Read for HttpRangeSource {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.is_canceled() || out.is_empty() {
            return Ok(0);
        }
        if let Some(len) = self.len {
            if self.pos >= len {
                return Ok(0);
            }
        }

        if self.buf.is_empty()
            || self.pos < self.buf_start
            || self.pos >= self.buf_start.saturating_add(self.buf.len() as u64)
        {
            self.refill()?;
        }
        if self.buf.is_empty() {
            return Ok(0);
        }

        let offset = (self.pos.saturating_sub(self.buf_start)) as usize;
        if offset >= self.buf.len() {
            return Ok(0);
        }
        let to_copy = self.buf.len().saturating_sub(offset).min(out.len());
        out[..to_copy].copy_from_slice(&self.buf[offset..offset + to_copy]);
        self.pos = self.pos.saturating_add(to_copy as u64);
        Ok(to_copy)
    }
}

impl Seek for HttpRangeSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(x) => x,
            SeekFrom::Current(d) => add_signed(self.pos, d),
            SeekFrom::End(d) => {
                let len = self.ensure_len()?;
                add_signed(len, d)
            }
        };
        self.pos = target;
        Ok(self.pos)
    }
}

impl MediaSource for HttpRangeSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        self.len
    }
}

/// Total length from a `Content-Range` header ("bytes start-end/total").
fn parse_content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.split_once('/')?;
    total.parse::<u64>().ok()
}

/// Add a signed delta to an unsigned base with saturation.
fn add_signed(base: u64, delta: i64) -> u64 {
    if delta >= 0 {
        base.saturating_add(delta as u64)
    } else {
        let neg = delta.checked_abs().unwrap_or(i64::MAX) as u64;
        base.saturating_sub(neg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_classifies_http_and_files() {
        assert_eq!(
            Locator::parse("https://example.org/a.ogg"),
            Locator::Http("https://example.org/a.ogg".to_string())
        );
        assert_eq!(
            Locator::parse("HTTP://example.org/a.ogg"),
            Locator::Http("HTTP://example.org/a.ogg".to_string())
        );
        assert_eq!(
            Locator::parse("/music/a.flac"),
            Locator::File(PathBuf::from("/music/a.flac"))
        );
        assert_eq!(
            Locator::parse("relative/song.mp3"),
            Locator::File(PathBuf::from("relative/song.mp3"))
        );
    }

    #[test]
    fn ext_hint_handles_query_and_missing_ext() {
        assert_eq!(
            ext_hint_for("http://example/a.flac?x=1"),
            Some("flac".to_string())
        );
        assert_eq!(ext_hint_for("http://example/a"), None);
        assert_eq!(
            ext_hint_for("http://example/archive.track.ogg"),
            Some("ogg".to_string())
        );
    }

    #[test]
    fn open_locator_missing_file_errors() {
        let err = open_locator("/definitely/not/here.wav", None);
        assert!(err.is_err());
    }

    #[test]
    fn default_range_config() {
        let cfg = HttpRangeConfig::default();
        assert_eq!(cfg.block_size, 512 * 1024);
        assert_eq!(cfg.timeout, Duration::from_secs(10));
    }

    #[test]
    fn new_source_starts_empty() {
        let source = HttpRangeSource::new(
            "http://example/track.ogg".to_string(),
            HttpRangeConfig::default(),
            None,
        );
        assert_eq!(source.pos, 0);
        assert!(source.len.is_none());
        assert!(source.buf.is_empty());
    }

    #[test]
    fn content_range_total_parsing() {
        assert_eq!(parse_content_range_total("bytes 0-99/12345"), Some(12345));
        assert_eq!(parse_content_range_total("bytes 0-99/*"), None);
        assert_eq!(parse_content_range_total("bytes 0-99"), None);
    }

    #[test]
    fn add_signed_saturates() {
        assert_eq!(add_signed(10, 5), 15);
        assert_eq!(add_signed(10, -3), 7);
        assert_eq!(add_signed(5, -10), 0);
        assert_eq!(add_signed(u64::MAX, 10), u64::MAX);
    }
}
