// Copyright 2026 steam-manifest contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::Parser;
use steam_manifest::cli::{self, StdinChooser};
use steam_manifest::config::{Endpoints, DLC_FETCH_DELAY};
use steam_manifest::engine::{Engine, EngineOptions};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "steam-manifest",
    about = "Fetch Steam depot manifests and keys from community repositories",
    version
)]
struct Cli {
    /// Steam application id or store search name
    #[arg(short, long)]
    appid: Option<String>,

    /// GitHub API token (GITHUB_API_TOKEN overrides this flag)
    #[arg(short, long)]
    key: Option<String>,

    /// Extra manifest repository checked before the defaults (owner/name)
    #[arg(short, long)]
    repo: Option<String>,

    /// Fixed manifest mode: pin manifest ids in the generated script
    #[arg(short, long)]
    fixed: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

const BANNER: &str = r#"
  ___ _____ ___   _   __  __   __  __   _   _  _ ___ ___ ___ ___ _____
 / __|_   _| __| /_\ |  \/  | |  \/  | /_\ | \| |_ _| __| __/ __|_   _|
 \__ \ | | | _| / _ \| |\/| | | |\/| |/ _ \| .` || || _|| _|\__ \ | |
 |___/ |_| |___/_/ \_\_|  |_| |_|  |_/_/ \_\_|\_|___|_| |___|___/ |_|
"#;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    println!("{BANNER}");

    let interactive = args.appid.is_none();
    let input = match &args.appid {
        Some(appid) => appid.clone(),
        None => match cli::prompt("enter a game name or id: ") {
            Ok(line) if !line.is_empty() => line,
            _ => {
                error!("no identifier given");
                std::process::exit(1);
            }
        },
    };

    let token = std::env::var("GITHUB_API_TOKEN").ok().or(args.key);
    let engine = Engine::new(EngineOptions {
        token,
        repo_override: args.repo,
        fixed_manifests: args.fixed,
        endpoints: Endpoints::default(),
        install_dir: None,
        dlc_delay: DLC_FETCH_DELAY,
    })?;

    let result = engine.run(&input, &StdinChooser).await;
    if let Err(e) = &result {
        error!("{e:#}");
    }
    if interactive {
        cli::pause();
    }
    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}
