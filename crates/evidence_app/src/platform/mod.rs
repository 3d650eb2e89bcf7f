pub mod app;
pub mod cli;
pub mod config;
pub mod effects;
pub mod logging;
pub mod render;

use anyhow::Context;

/// Loads configuration, sets up logging and runs one CLI command to completion.
pub fn run(cli: cli::Cli) -> anyhow::Result<()> {
    let mut config = config::load(cli.config.as_deref()).context("loading configuration")?;
    config.apply_overrides(&cli);
    config.validate()?;

    let level = config.log_level()?;
    logging::initialize(config.log.destination, logging::raise_level(level, cli.verbose));

    app::run(&cli.command, &config)
}
