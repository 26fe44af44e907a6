use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trustbucket::deploy::DeployArgs;
use trustbucket::seed::SeedArgs;
use trustbucket::teardown::TeardownArgs;
use trustbucket::FileOutputsStore;
use trustbucket_config::{Backend, LogFormat, Settings, StdEnvSource};

/// Deploy, seed and tear down an S3 bucket shared with two trusted accounts
#[derive(Parser)]
#[command(name = "trustbucket")]
#[command(version)]
#[command(about = "Deploy, seed and tear down an S3 bucket shared with two trusted accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// How to reach AWS: sdk or cli
    #[arg(long, value_name = "BACKEND", global = true)]
    backend: Option<Backend>,

    /// Where stack outputs are recorded
    #[arg(long, value_name = "PATH", global = true)]
    outputs_file: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the stack and record its outputs
    Deploy(DeployArgs),
    /// Upload the files in the seed directory to the bucket
    Seed(SeedArgs),
    /// Empty the bucket, delete the stack and remove the outputs record
    Teardown(TeardownArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env = StdEnvSource;
    let mut settings =
        Settings::load(cli.config.as_deref(), &env).context("Failed to load configuration")?;
    apply_cli_overrides(&mut settings, &cli);
    settings.validate()?;

    trustbucket::init_tracing(&settings);

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli.command, settings, env))
}

async fn async_main(command: Commands, settings: Settings, env: StdEnvSource) -> Result<()> {
    let store = FileOutputsStore::new(&settings.outputs_file);
    match command {
        Commands::Deploy(args) => trustbucket::deploy::run(args, &settings, &env, &store).await,
        Commands::Seed(args) => trustbucket::seed::run(args, &settings, &env, &store).await,
        Commands::Teardown(args) => {
            trustbucket::teardown::run(args, &settings, &env, &store).await
        }
    }
}

fn apply_cli_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }
    if let Some(path) = &cli.outputs_file {
        settings.outputs_file = path.clone();
    }
    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        settings.log_format = format;
    }
}
