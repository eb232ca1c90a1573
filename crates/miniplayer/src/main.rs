//! Miniplayer — a single-track playback daemon.
//!
//! Exposes `play_song`/`pause_song` over HTTP, decodes with Symphonia, and
//! renders through CPAL. While a track plays the daemon publishes a
//! now-playing card to the OS media controls and accepts play/pause events
//! back from them.

mod api;
mod cli;
mod controls;
mod player;

use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use playdeck_engine::config::EngineConfig;
use playdeck_engine::device;
use playdeck_engine::status::StatusState;

use crate::api::AppState;
use crate::player::PlayerCommand;

#[actix_web::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,actix_web=info,miniplayer=info")
        }))
        .init();

    if args.list_devices {
        let host = cpal::default_host();
        for name in device::output_device_names(&host)? {
            println!("{name}");
        }
        return Ok(());
    }

    let engine = EngineConfig {
        chunk_frames: args.chunk_frames,
        refill_max_frames: args.refill_max_frames,
        buffer_seconds: args.buffer_seconds,
    };
    let device_name = args.device.as_deref().map(str::trim).and_then(|name| {
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    });

    tracing::info!(bind = %args.http_bind, version = cli::VERSION, "starting miniplayer");

    let status = StatusState::shared();
    let (player, worker_join) = player::spawn_player(engine, device_name, status.clone());

    let shutdown_tx = player.cmd_tx.clone();
    let _ = ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(PlayerCommand::Quit);
        if let Some(system) = actix_web::rt::System::try_current() {
            system.stop();
        }
    });

    let state = web::Data::new(AppState {
        player: player.clone(),
        status,
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default().exclude("/status").exclude("/health"))
            .service(api::play_song)
            .service(api::pause_song)
            .service(api::status)
            .service(api::health)
    })
    .bind(args.http_bind)?
    .run()
    .await?;

    let _ = player.cmd_tx.send(PlayerCommand::Quit);
    let _ = worker_join.join();
    tracing::info!("miniplayer stopped");
    Ok(())
}
