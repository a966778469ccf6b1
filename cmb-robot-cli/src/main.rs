use anyhow::{Context, Result};
use clap::Parser;
use cmb_robot::{
    create_engine, HealthMonitor, Robot, RobotSettings, RunMode, Supervisor, SupervisorConfig,
};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Keeps the CMB direct-connect client logged in and listening"
)]
struct Args {
    /// Settings file (TOML, already decrypted)
    #[arg(short, long, env = "CMB_ROBOT_CONFIG", default_value = "cmb-robot.toml")]
    config: PathBuf,

    /// Run a single recovery with these steps and exit instead of
    /// supervising, e.g. `relisten,relogin` or `full`
    #[arg(long, value_name = "MODE")]
    once: Option<RunMode>,
}

fn load_settings(path: &Path) -> Result<RobotSettings> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings from {}", path.display()))?;
    let settings: RobotSettings = toml::from_str(&text)
        .with_context(|| format!("failed to parse settings in {}", path.display()))?;
    Ok(settings)
}

fn log_level() -> Level {
    env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO)
}

fn log_dir() -> PathBuf {
    if let Ok(custom_dir) = env::var("CMB_ROBOT_LOG_DIR") {
        return PathBuf::from(custom_dir);
    }
    dirs::data_local_dir()
        .unwrap_or_else(env::temp_dir)
        .join("cmb-robot")
        .join("logs")
}

/// Stderr plus a daily rolling file. `RUST_LOG` wins over `LOG_LEVEL`.
fn init_logging() -> Result<()> {
    use tracing_appender::rolling;

    let level = log_level();
    let log_dir = log_dir();
    let dir_error = std::fs::create_dir_all(&log_dir).err();

    let file_appender = rolling::daily(&log_dir, "cmb-robot.log");
    let filter = || EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_filter(filter()),
        )
        .try_init()
        .context("failed to initialise logging")?;

    if let Some(e) = dir_error {
        warn!("Failed to create log directory {}: {}", log_dir.display(), e);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging()?;

    let settings = load_settings(&args.config)?;
    info!(username = %settings.username, config = %args.config.display(), "settings loaded");

    let engine = create_engine()?;
    let robot = Robot::from_settings(engine, &settings)?;

    if let Some(mode) = args.once {
        let performed = robot.run(mode).await?;
        info!(username = %settings.username, mode = %performed, "recovery finished");
        return Ok(());
    }

    let monitor = HealthMonitor::from_settings(&settings)?;
    let mut supervisor = Supervisor::new(monitor, robot, SupervisorConfig::default())
        .with_username(settings.username.clone());

    tokio::select! {
        fatal = supervisor.run() => {
            error!(username = %settings.username, fatal = true, "supervisor stopped: {fatal}");
            std::process::exit(1);
        }
        _ = tokio::signal::ctrl_c() => {
            info!(username = %settings.username, "received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
