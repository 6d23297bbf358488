use clap::Parser;
use mcp_compress_proxy::cli::args::{CacheCommand, Cli, CommonArgs};
use mcp_compress_proxy::cli::commands;
use mcp_compress_proxy::config::{Config, ConfigManager, LogFormat};
use mcp_compress_proxy::utils::tracing::init_tracing;

fn init_logging(common: &CommonArgs, config: Option<&Config>) {
    let level = common
        .log_level
        .clone()
        .or_else(|| config.map(|c| c.logging.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let format = common
        .log_format
        .map(LogFormat::from)
        .or_else(|| config.map(|c| c.logging.format))
        .unwrap_or_default();
    init_tracing(&level, format);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let common = cli.common().clone();
    let config_path = common.config_path();

    if let Cli::Validate(args) = &cli {
        init_logging(&common, None);
        if args.schema {
            commands::print_schema();
        } else {
            commands::validate(&config_path).await?;
        }
        return Ok(());
    }

    let config = ConfigManager::load(&config_path).await?.get_config();
    init_logging(&common, Some(&config));

    match cli {
        Cli::Serve(args) => commands::serve(config, args.host, args.port).await?,
        Cli::Status(_) => commands::status(&config).await?,
        Cli::Pending(_) => commands::pending(&config).await?,
        Cli::Import(args) => {
            commands::import(&config, &args.file).await?;
        }
        Cli::Cache(args) => match args.command {
            CacheCommand::Stats => commands::cache_stats(&config).await?,
            CacheCommand::Clear => commands::cache_clear(&config).await?,
        },
        Cli::Validate(_) => {}
    }

    Ok(())
}
