use crate::app::App;
use crate::config::{CONFIG_INI_PATH, Config, SETTINGS_JSON_PATH};
use log::{LevelFilter, error, info};
use std::error::Error;
use std::path::Path;

mod app;
mod calibration;
mod config;
mod core;
mod game;
mod utils;

fn main() -> Result<(), Box<dyn Error>> {
    // --- Logging Setup ---
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .filter_module("osu_pilot::game::parsing", LevelFilter::Debug)
        .filter_module("osu_pilot::core::platform", LevelFilter::Info)
        .init();

    info!("osu-pilot starting...");
    let dry_run = std::env::args().skip(1).any(|arg| arg == "--dry-run");

    // --- Configuration ---
    let config = Config::load(Path::new(CONFIG_INI_PATH));
    let reaction_time = calibration::session_reaction_time(
        Path::new(SETTINGS_JSON_PATH),
        config.reaction_time_override,
        config.reaction_time_default,
    );

    // --- Run ---
    if let Err(e) = App::new(config, reaction_time, dry_run).run() {
        error!("osu-pilot exited with error: {}", e);
        return Err(e);
    }

    info!("osu-pilot exited gracefully.");
    Ok(())
}
