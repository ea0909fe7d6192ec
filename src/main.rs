use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use regex::Regex;
use tracing::{info, warn};

use firmware_monitor::config::{
    DEFAULT_REQUEST_DELAY_MS, FETCH_TIMEOUT_MS, NOTIFY_TIMEOUT_MS, TelegramConfig,
};
use firmware_monitor::logging::{self, LogFormat};
use firmware_monitor::monitor::{DeviceSelection, Monitor, MonitorOptions, RunOutcome};
use firmware_monitor::notify::TelegramNotifier;
use firmware_monitor::notify::telegram::DEFAULT_TELEGRAM_URL;
use firmware_monitor::source::catalog::DEFAULT_CATALOG_URL;
use firmware_monitor::source::firmware::{DEFAULT_CEILING, DEFAULT_FIRMWARE_URL};
use firmware_monitor::source::{HttpDeviceCatalog, IpswFirmwareSource};
use firmware_monitor::state::{DEFAULT_STATE_FILE, StateStore};
use firmware_monitor::version::Version;

#[derive(Parser)]
#[command(name = "firmware-monitor")]
#[command(version, about = "Reports newly signed iOS firmware below a version ceiling")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Persisted record of previously seen signed versions
    #[arg(long, env = "MONITOR_STATE_FILE", default_value = DEFAULT_STATE_FILE, global = true)]
    state_file: PathBuf,

    /// Device catalog URL (grouped categories or a flat ipsw.me device list)
    #[arg(long, env = "MONITOR_CATALOG_URL", default_value = DEFAULT_CATALOG_URL)]
    catalog_url: String,

    /// Base URL of the ipsw.me API
    #[arg(long, env = "MONITOR_FIRMWARE_URL", default_value = DEFAULT_FIRMWARE_URL)]
    firmware_url: String,

    /// Base URL of the Telegram Bot API
    #[arg(long, env = "MONITOR_TELEGRAM_URL", default_value = DEFAULT_TELEGRAM_URL)]
    telegram_url: String,

    /// Only query these device ids (repeatable or comma separated).
    /// Defaults to iPhone15,2, iPhone15,3 and iPhone14,2 unless a pattern is given.
    #[arg(long = "device", env = "MONITOR_DEVICES", value_delimiter = ',')]
    devices: Vec<String>,

    /// Only query device ids matching this regex
    #[arg(long, env = "MONITOR_DEVICE_PATTERN", value_parser = Regex::new)]
    device_pattern: Option<Regex>,

    /// Ignore firmware at or above this version
    #[arg(long, env = "MONITOR_CEILING", default_value = DEFAULT_CEILING, value_parser = Version::parse)]
    ceiling: Version,

    /// Pause between per-device requests, in milliseconds
    #[arg(long, env = "MONITOR_DELAY_MS", default_value_t = DEFAULT_REQUEST_DELAY_MS)]
    delay_ms: u64,

    /// Only notify when some device has a new signed version
    #[arg(long, env = "MONITOR_NOTIFY_ONLY_ON_CHANGE")]
    notify_only_on_change: bool,

    /// Print the report without notifying or saving state
    #[arg(long)]
    dry_run: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Command {
    /// Print the persisted state and exit
    State,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(cli.log_format);

    match cli.command {
        Some(Command::State) => print_state(&cli.state_file),
        None => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(run(cli)),
    }
}

fn print_state(path: &std::path::Path) -> anyhow::Result<()> {
    let state = StateStore::new(path).load()?;
    println!("{}", state.to_json()?);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let fetch_timeout = Duration::from_millis(FETCH_TIMEOUT_MS);

    let telegram = TelegramConfig::from_env();
    if let Err(e) = &telegram {
        warn!("Telegram delivery disabled: {}", e);
    }

    let catalog = HttpDeviceCatalog::new(&cli.catalog_url, fetch_timeout)?;
    let firmware = IpswFirmwareSource::new(&cli.firmware_url, cli.ceiling.clone(), fetch_timeout)?;
    let notifier = TelegramNotifier::new(
        &cli.telegram_url,
        telegram,
        Duration::from_millis(NOTIFY_TIMEOUT_MS),
    )?;

    let options = MonitorOptions {
        selection: DeviceSelection::new(cli.devices, cli.device_pattern),
        request_delay: Duration::from_millis(cli.delay_ms),
        notify_only_on_change: cli.notify_only_on_change,
        dry_run: cli.dry_run,
    };

    info!(
        "Firmware monitor starting, ceiling {}, {} device ids, Telegram {}",
        cli.ceiling,
        options.selection.ids.len(),
        if notifier.is_configured() { "configured" } else { "disabled" }
    );

    let monitor = Monitor::new(
        Arc::new(catalog),
        Arc::new(firmware),
        Arc::new(notifier),
        StateStore::new(cli.state_file),
        options,
    );

    match monitor.run().await {
        RunOutcome::Aborted(e) => warn!("Run aborted, state left untouched: {}", e),
        RunOutcome::Completed(summary) => {
            println!("{}", summary.report);
            info!(
                "Run complete: {} devices, notified: {}, saved: {}",
                summary.results.len(),
                summary.notified,
                summary.saved
            );
        }
    }

    Ok(())
}
