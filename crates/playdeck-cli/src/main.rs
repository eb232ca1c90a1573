//! playdeck — controller for the playdeck session host.
//!
//! One-shot subcommands resolve a session, run one command, and exit. The
//! `ui` subcommand opens an interactive shell with play/pause/skip controls
//! over the same controller.

mod cli;
mod connectivity;
mod controller;
mod discovery;
mod logging;
mod ui;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use playdeck_engine::meta::{self, TrackTags};
use playdeck_types::PlayableItem;

use crate::cli::Command;
use crate::controller::ResolveSpec;

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    let args = cli::Args::parse();
    let spec = ResolveSpec {
        server: args.server.clone(),
        instance: args.instance.clone(),
        client_id: args.client_id.clone(),
    };

    match args.cmd {
        Command::Ui => {
            logging::init_file()?;
            ui::run_tui(spec)
        }
        Command::Skip => {
            logging::init_stderr();
            // Fixed refusal; skip never reaches the server.
            eprintln!("{}", cli::SKIP_NOTICE);
            std::process::exit(1);
        }
        Command::Probe { locator } => {
            logging::init_stderr();
            probe(&locator);
            Ok(())
        }
        Command::Play {
            locator,
            title,
            artist,
            album,
        } => {
            logging::init_stderr();
            let mut promise = controller::resolve(spec);
            let handle = promise.wait(RESOLVE_TIMEOUT)?;
            let item = PlayableItem {
                title,
                artist,
                album,
                ..PlayableItem::from_locator(locator.clone())
            };
            handle.submit(vec![item])?;
            println!("submitted {locator}");
            Ok(())
        }
        Command::Pause => {
            logging::init_stderr();
            let mut promise = controller::resolve(spec);
            let handle = promise.wait(RESOLVE_TIMEOUT)?;
            handle.pause()?;
            println!("paused");
            Ok(())
        }
        Command::Status => {
            logging::init_stderr();
            let mut promise = controller::resolve(spec);
            let handle = promise.wait(RESOLVE_TIMEOUT)?;
            let status = handle.status()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}

/// Probe a locator's tags. A failed probe logs and prints empty tags; the
/// result is never attached to anything submitted.
fn probe(locator: &str) {
    let tags = meta::probe_tags(locator).unwrap_or_else(|e| {
        tracing::warn!(locator = %locator, "probe failed: {e:#}");
        TrackTags::default()
    });
    println!("title:       {}", tags.title.as_deref().unwrap_or("-"));
    println!("artist:      {}", tags.artist.as_deref().unwrap_or("-"));
    println!("album:       {}", tags.album.as_deref().unwrap_or("-"));
    println!("genre:       {}", tags.genre.as_deref().unwrap_or("-"));
    match tags.duration_ms {
        Some(ms) => println!("duration_ms: {ms}"),
        None => println!("duration_ms: -"),
    }
}
