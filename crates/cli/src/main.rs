mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::Settings;
use output::{OutputFormat, print_error};

/// layerpack - content-addressed packer for function archives and dependency layers
#[derive(Parser)]
#[command(name = "layerpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Path to the config file (default: ./layerpack.json if present)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Bucket to publish to
  #[arg(long, global = true)]
  bucket: Option<String>,

  /// Directory for packed archives
  #[arg(long, global = true)]
  out_dir: Option<PathBuf>,

  /// Store location: an http(s) endpoint or a directory
  #[arg(long, global = true)]
  store: Option<String>,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the checksum of the files matching the given patterns
  Checksum {
    /// File paths or glob patterns
    #[arg(required = true)]
    patterns: Vec<String>,

    /// Hash algorithm
    #[arg(short, long, value_enum, default_value_t = cmd::Algorithm::Sha1)]
    algorithm: cmd::Algorithm,
  },

  /// Pack and publish the dependency layer
  Layer {
    /// Directory containing package.json and the lockfile (overrides config)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Layer name
    #[arg(long)]
    name: Option<String>,

    /// Install command, split on whitespace
    #[arg(long)]
    install_command: Option<String>,
  },

  /// Pack and publish every configured function
  Lambdas,

  /// Pack the layer and all functions
  Pack,
}

fn main() {
  let cli = Cli::parse();

  let default_filter = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  if let Err(e) = run(cli) {
    print_error(&format!("{:#}", e));
    std::process::exit(1);
  }
}

fn run(cli: Cli) -> Result<()> {
  let settings = Settings {
    config: cli.config,
    bucket: cli.bucket,
    out_dir: cli.out_dir,
    store: cli.store,
    output: cli.output,
  };

  match cli.command {
    Commands::Checksum { patterns, algorithm } => cmd::cmd_checksum(&patterns, algorithm, settings.output),
    Commands::Layer {
      dir,
      name,
      install_command,
    } => cmd::cmd_layer(&settings, dir, name, install_command),
    Commands::Lambdas => cmd::cmd_lambdas(&settings),
    Commands::Pack => cmd::cmd_pack(&settings),
  }
}
