//! Ember - a static site builder.

use anyhow::{Result, bail};
use clap::Parser;
use ember::{
    cli::{Cli, Commands},
    config::SiteConfig,
    init::new_site,
    log, logger,
    serve::serve_site,
    site::{BuildStatus, Site},
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::set_quiet(cli.quiet);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Init { name } => new_site(&config, name.is_some()),
        Commands::Build { .. } => {
            let mut site = Site::new(config)?;
            build(&mut site)
        }
        Commands::Serve { .. } => {
            let mut site = Site::new(config)?;
            build(&mut site)?;
            serve_site(site)
        }
        Commands::Run { name } => {
            let site = Site::new(config)?;
            if !site.run(name)? {
                bail!("script `{name}` failed");
            }
            Ok(())
        }
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let config = SiteConfig::load(cli)?;

    if cli.is_init() {
        if config.config_path.exists() {
            bail!("Config file already exists. Remove it manually or init in a different path.");
        }
    } else {
        config.validate()?;
    }

    Ok(config)
}

/// Full build; a vetoed build is reported but is not a failure.
fn build(site: &mut Site) -> Result<()> {
    if site.build()? == BuildStatus::Aborted {
        log!("build"; "skipped");
    }
    Ok(())
}
