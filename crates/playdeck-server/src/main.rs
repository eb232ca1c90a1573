mod api;
mod config;
mod mdns;
mod openapi;
mod sessions;
mod state;
mod worker;

use std::net::SocketAddr;
use std::path::PathBuf;

use actix_web::{App, HttpServer, Responder, get, middleware::Logger, web};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

use playdeck_engine::config::EngineConfig;
use playdeck_engine::status::StatusState;

use crate::state::AppState;
use crate::worker::PlayerCommand;

pub(crate) const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

const DEFAULT_BIND: &str = "0.0.0.0:5800";

#[derive(Parser, Debug)]
#[command(name = "playdeck-server", version = VERSION)]
struct Args {
    /// HTTP bind address, e.g. 0.0.0.0:5800
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Use a specific output device by substring match
    #[arg(long)]
    device: Option<String>,

    /// mDNS instance name advertised to controllers (defaults to the hostname)
    #[arg(long)]
    instance_name: Option<String>,

    /// Disable mDNS advertisement
    #[arg(long)]
    no_mdns: bool,

    /// Resampler input chunk size in frames
    #[arg(long)]
    chunk_frames: Option<usize>,

    /// Playback callback refill cap (frames)
    #[arg(long)]
    refill_max_frames: Option<usize>,

    /// Queue buffer target in seconds (per stage)
    #[arg(long)]
    buffer_seconds: Option<f32>,

    /// Optional server config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[get("/api-doc/openapi.json")]
async fn openapi_json() -> impl Responder {
    web::Json(openapi::ApiDoc::openapi())
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,actix_web=info,playdeck_server=info")
        }))
        .init();

    let cfg = match args.config.as_ref() {
        Some(path) => config::ServerConfig::load(path)?,
        None => config::ServerConfig::load_default()?,
    };
    let bind = match args.bind {
        Some(addr) => addr,
        None => config::bind_from_config(&cfg)?
            .unwrap_or_else(|| DEFAULT_BIND.parse().expect("default bind")),
    };
    let engine = merge_engine_config(&args, &cfg);
    let device = normalize_device_name(args.device.clone().or_else(|| cfg.device.clone()));
    let instance_name = match args.instance_name.as_deref() {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => config::instance_name_from_config(&cfg),
    };

    tracing::info!(
        bind = %bind,
        instance = %instance_name,
        version = VERSION,
        "starting playdeck-server"
    );

    let status = StatusState::shared();
    let (player, worker_join) = worker::spawn_player_worker(engine, device, status.clone());

    let shutdown_tx = player.cmd_tx.clone();
    let _ = ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(PlayerCommand::Quit);
        if let Some(system) = actix_web::rt::System::try_current() {
            system.stop();
        }
    });

    let mdns_handle = if args.no_mdns {
        None
    } else {
        Some(mdns::spawn_advertise_loop(instance_name, bind))
    };

    let state = web::Data::new(AppState::new(player.clone(), status));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default().exclude("/status").exclude("/health"))
            .service(openapi_json)
            .service(api::sessions_create)
            .service(api::sessions_list)
            .service(api::play_batch)
            .service(api::pause)
            .service(api::stop)
            .service(api::status)
            .service(api::health::health)
    })
    .bind(bind)?
    .run()
    .await?;

    // Pause-then-stop whatever is playing, then wait for the worker to
    // release the engine.
    let _ = player.cmd_tx.send(PlayerCommand::Quit);
    let _ = worker_join.join();
    if let Some(handle) = mdns_handle {
        if let Ok(mut g) = handle.lock() {
            if let Some(ad) = g.take() {
                ad.shutdown();
            }
        }
    }
    tracing::info!("playdeck-server stopped");
    Ok(())
}

/// Merge playback tuning: flags override the config file, which overrides
/// engine defaults.
fn merge_engine_config(args: &Args, cfg: &config::ServerConfig) -> EngineConfig {
    let defaults = EngineConfig::default();
    EngineConfig {
        chunk_frames: args
            .chunk_frames
            .or(cfg.chunk_frames)
            .unwrap_or(defaults.chunk_frames),
        refill_max_frames: args
            .refill_max_frames
            .or(cfg.refill_max_frames)
            .unwrap_or(defaults.refill_max_frames),
        buffer_seconds: args
            .buffer_seconds
            .or(cfg.buffer_seconds)
            .unwrap_or(defaults.buffer_seconds),
    }
}

fn normalize_device_name(device: Option<String>) -> Option<String> {
    device.and_then(|name| {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_args() -> Args {
        Args {
            bind: None,
            device: None,
            instance_name: None,
            no_mdns: false,
            chunk_frames: None,
            refill_max_frames: None,
            buffer_seconds: None,
            config: None,
        }
    }

    #[test]
    fn merge_engine_config_prefers_flags_over_file() {
        let mut args = bare_args();
        args.chunk_frames = Some(512);
        let cfg = config::ServerConfig {
            chunk_frames: Some(2048),
            buffer_seconds: Some(1.0),
            ..config::ServerConfig::default()
        };
        let engine = merge_engine_config(&args, &cfg);
        assert_eq!(engine.chunk_frames, 512);
        assert_eq!(engine.buffer_seconds, 1.0);
        assert_eq!(engine.refill_max_frames, EngineConfig::default().refill_max_frames);
    }

    #[test]
    fn normalize_device_name_trims_and_drops_empty() {
        assert_eq!(normalize_device_name(None), None);
        assert_eq!(normalize_device_name(Some("  ".to_string())), None);
        assert_eq!(
            normalize_device_name(Some("  USB DAC ".to_string())),
            Some("USB DAC".to_string())
        );
    }
}
