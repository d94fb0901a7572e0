use crate::commands::{Cli, Command};
use crate::handlers;
use anyhow::Result;
use arcu_client::logging::{setup_logging, LoggingOptions};
use arcu_common::config::ConfigLoader;
use clap::Parser;

pub fn process_cli() -> Result<()> {
    let cli = Cli::parse();
    // Use the --config flag, if provided, when loading the configuration
    let config = ConfigLoader::load_config(cli.config.as_deref())?;

    if let Command::Config { json } = cli.command {
        return handlers::print_config(&config, json);
    }

    let _guard = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    setup_logging(&LoggingOptions {
        production: config.production,
        log_file: None,
    })?;

    tokio::runtime::Runtime::new()?.block_on(async move {
        match cli.command {
            Command::Report(args) => handlers::report(config, args).await,
            Command::SetUser { user_id, info } => {
                handlers::set_user(config, &user_id, info.as_deref())
            }
            Command::SetTags { tags } => handlers::set_tags(config, tags),
            Command::Config { json } => handlers::print_config(&config, json),
        }
    })
}
