//! CLI argument types - shared between binary and tests

use crate::cli::default_config_path;
use crate::config::LogFormat;
use clap::{Args, Parser, Subcommand};

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum LogFormatCli {
    /// Human readable lines
    Pretty,
    /// One JSON object per line
    Json,
}

impl From<LogFormatCli> for LogFormat {
    fn from(val: LogFormatCli) -> Self {
        match val {
            LogFormatCli::Pretty => LogFormat::Pretty,
            LogFormatCli::Json => LogFormat::Json,
        }
    }
}

#[derive(Parser)]
#[command(name = "mcp-compress-proxy")]
#[command(about = "MCP proxy that aggregates backend tools behind compressed descriptions")]
#[command(version)]
pub enum Cli {
    /// Start the proxy
    Serve(ServeArgs),
    /// Connect to every backend and report its status
    Status(CommonArgs),
    /// List live tools that still need a compressed description
    Pending(CommonArgs),
    /// Import compressed descriptions from a JSON file
    Import(ImportArgs),
    /// Inspect or clear the compression cache
    Cache(CacheArgs),
    /// Validate the configuration file
    Validate(ValidateArgs),
}

impl Cli {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Cli::Serve(args) => &args.common,
            Cli::Status(common) | Cli::Pending(common) => common,
            Cli::Import(args) => &args.common,
            Cli::Cache(args) => &args.common,
            Cli::Validate(args) => &args.common,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, env = "MCP_COMPRESS_PROXY_CONFIG", global = true)]
    pub config: Option<String>,
    /// Log level, overrides the config file
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
    /// Log output format, overrides the config file
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormatCli>,
}

impl CommonArgs {
    /// The config path given on the command line, or the platform default
    pub fn config_path(&self) -> String {
        self.config
            .clone()
            .unwrap_or_else(|| default_config_path().to_string_lossy().into_owned())
    }
}

#[derive(Parser)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Host to bind to
    #[arg(short = 'H', long)]
    pub host: Option<String>,
    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Parser)]
pub struct ImportArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// JSON array of {serverName, toolName, compressedDescription, originalDescription?}
    pub file: String,
}

#[derive(Parser)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show cache metrics
    Stats,
    /// Delete every compressed description
    Clear,
}

#[derive(Parser)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Print the configuration JSON schema instead
    #[arg(long)]
    pub schema: bool,
}
