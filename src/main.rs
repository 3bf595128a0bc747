//! segcast CLI entry point

use std::process::ExitCode;

use clap::Parser;

use segcast::cli::{
    app::{load_merged_config, EXIT_ERROR, EXIT_USAGE_ERROR},
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    logging::init_logging,
    presenter::Presenter,
    run_record, run_send, RecordOptions, SendOptions,
};
use segcast::domain::config::{AppConfig, DEFAULT_LOG_LEVEL};
use segcast::infrastructure::XdgConfigStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut presenter = Presenter::with_json(cli.json);
    let store = XdgConfigStore::new();

    // Handle config management before touching the merged config
    let args_config = match &cli.command {
        Commands::Config { action } => {
            init_logging(cli.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL));
            if let Err(e) = handle_config_command(action.clone(), &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            return ExitCode::SUCCESS;
        }
        Commands::Record(args) => args.to_config(),
        Commands::Send(args) => args.transport.to_config(),
    };

    // Build CLI config from args
    let cli_config = AppConfig {
        log_level: cli.log_level.clone(),
        ..Default::default()
    }
    .merge(args_config);

    // Merge config
    let config = match load_merged_config(&store, cli_config).await {
        Ok(config) => config,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };
    init_logging(config.log_level_or_default());

    // Route to appropriate handler
    match cli.command {
        Commands::Record(args) => match RecordOptions::resolve(&config, args.channel.as_deref()) {
            Ok(options) => run_record(options, &mut presenter).await,
            Err(e) => {
                presenter.error(&e);
                ExitCode::from(EXIT_USAGE_ERROR)
            }
        },
        Commands::Send(args) => {
            match SendOptions::resolve(&config, args.file, &args.channel, args.message_id) {
                Ok(options) => run_send(options, &presenter).await,
                Err(e) => {
                    presenter.error(&e);
                    ExitCode::from(EXIT_USAGE_ERROR)
                }
            }
        }
        Commands::Config { .. } => ExitCode::SUCCESS,
    }
}
