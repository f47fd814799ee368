use clap::Parser;
use nanoapp::{config::SystemConfig, system::System, Error, LoopExit};
use std::path::PathBuf;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File replayed line by line
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Number of workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Number of tasks queued at startup
    #[arg(short, long)]
    tasks: Option<u64>,

    /// Listener port, repeat for several listeners
    #[arg(short, long = "port")]
    ports: Vec<u16>,

    /// Do not read from the console
    #[arg(long)]
    no_keyboard: bool,

    /// Do not replay the input file
    #[arg(long)]
    no_file: bool,

    /// Enable debug mode
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(cli: &Cli) -> Result<SystemConfig, Error> {
    let mut config = match &cli.config {
        Some(path) => SystemConfig::from_file(path)?,
        None => SystemConfig::default(),
    };
    if let Some(input) = &cli.input {
        config.file.path = input.clone();
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(tasks) = cli.tasks {
        config.task_count = tasks;
    }
    if !cli.ports.is_empty() {
        config.network.ports = cli.ports.clone();
    }
    if cli.no_keyboard {
        config.keyboard.enabled = false;
    }
    if cli.no_file {
        config.file.enabled = false;
    }
    Ok(config)
}

async fn run(cli: &Cli) -> Result<LoopExit, Error> {
    let system = System::new(load_config(cli)?);
    info!("config loaded.");
    debug!("config: {:?}", system.config());

    let running = system.start().await?;
    running.shutdown_signal().spawn_os_listener();

    info!(ports = ?running.ports(), "Nano-app running. Press Ctrl+C to shutdown.");
    let report = running.wait().await;
    info!(exit = %report.exit, stats = ?report.stats, "Nano-app exiting");
    Ok(report.exit)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let code = match run(&cli).await {
        Ok(_) => 0,
        Err(e) => {
            error!(error = %e, "Startup failed");
            1
        }
    };
    // exit here so a stdin read still blocked in the keyboard adapter does
    // not hold the runtime open
    std::process::exit(code);
}
