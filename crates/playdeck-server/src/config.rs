//! Configuration loading.
//!
//! The session host reads an optional TOML file; command-line flags override
//! whatever the file provides.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Host configuration loaded from TOML. Every field is optional; defaults
/// apply when the file or a field is absent.
#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    /// Bind address (host:port).
    pub bind: Option<String>,
    /// Instance name advertised over mDNS (defaults to the hostname).
    pub instance_name: Option<String>,
    /// Output device selected by substring match.
    pub device: Option<String>,
    /// Resampler input chunk size in frames.
    pub chunk_frames: Option<usize>,
    /// Output callback refill cap in frames.
    pub refill_max_frames: Option<usize>,
    /// Queue buffer target in seconds per stage.
    pub buffer_seconds: Option<f32>,
}

impl ServerConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<ServerConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }

    /// Load the file next to the executable when present, else defaults.
    pub fn load_default() -> Result<Self> {
        let auto_path = std::env::current_exe()
            .ok()
            .and_then(|path| path.parent().map(|dir| dir.join("config.toml")));
        match auto_path {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Parse an optional bind address from config.
pub fn bind_from_config(cfg: &ServerConfig) -> Result<Option<SocketAddr>> {
    let Some(bind) = cfg.bind.as_deref() else {
        return Ok(None);
    };
    let addr = bind.parse().with_context(|| format!("parse bind {bind}"))?;
    Ok(Some(addr))
}

/// Instance name from config or the machine hostname.
pub fn instance_name_from_config(cfg: &ServerConfig) -> String {
    cfg.instance_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_parses_all_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "bind = \"127.0.0.1:5600\"\ninstance_name = \"den\"\ndevice = \"USB DAC\"\nchunk_frames = 2048\nbuffer_seconds = 1.5"
        )
        .unwrap();

        let cfg = ServerConfig::load(&path).unwrap();
        assert_eq!(cfg.instance_name.as_deref(), Some("den"));
        assert_eq!(cfg.device.as_deref(), Some("USB DAC"));
        assert_eq!(cfg.chunk_frames, Some(2048));
        assert_eq!(cfg.buffer_seconds, Some(1.5));
        let bind = bind_from_config(&cfg).unwrap().unwrap();
        assert_eq!(bind, "127.0.0.1:5600".parse().unwrap());
    }

    #[test]
    fn bind_from_config_rejects_garbage() {
        let cfg = ServerConfig {
            bind: Some("not-an-addr".to_string()),
            ..ServerConfig::default()
        };
        assert!(bind_from_config(&cfg).is_err());
    }

    #[test]
    fn instance_name_falls_back_to_hostname() {
        let cfg = ServerConfig {
            instance_name: Some("  ".to_string()),
            ..ServerConfig::default()
        };
        assert!(!instance_name_from_config(&cfg).is_empty());
    }

    #[test]
    fn missing_config_file_errors() {
        assert!(ServerConfig::load(Path::new("/no/such/config.toml")).is_err());
    }
}
