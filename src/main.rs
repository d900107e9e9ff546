#![deny(clippy::unwrap_used)]

use clap::{arg, command, value_parser, ArgAction};
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use qis_multistream::config::{
    Launcher, Settings, StreamPlan, DEFAULT_QIS_HOST, DEFAULT_QIS_PORT,
};
use qis_multistream::qis::QisService;
use qis_multistream::{run, ModuleAddress, PowerModule, QisError, ResampleInterval, Result};

fn cli() -> clap::Command {
    command!() // requires `cargo` feature
        .arg(
            arg!(
                -m --module <ID> "Module to stream with, e.g. TCP:QTL2789-01-001"
            )
            .required(false)
            .env("QIS_MODULES")
            .value_delimiter(',')
            .action(ArgAction::Append)
            .value_parser(value_parser!(ModuleAddress)),
        )
        .arg(
            arg!(--host <HOST> "QIS host")
                .env("QIS_HOST")
                .default_value(DEFAULT_QIS_HOST),
        )
        .arg(
            arg!(--port <PORT> "QIS port")
                .env("QIS_PORT")
                .default_value(DEFAULT_QIS_PORT.to_string())
                .value_parser(value_parser!(u16)),
        )
        .arg(
            arg!(--"connect-timeout" <SECS> "Time to wait for each module to show up")
                .default_value("30")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--duration <SECS> "Stream duration")
                .default_value("30")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            arg!(--"stream-resample" <INTERVAL> "Resampling for the streaming run")
                .default_value("1mS")
                .value_parser(value_parser!(ResampleInterval)),
        )
        .arg(
            arg!(--"monitor-resample" <INTERVAL> "Resampling for the monitoring run")
                .default_value("500mS")
                .value_parser(value_parser!(ResampleInterval)),
        )
        .arg(
            arg!(--"monitor-interval" <MS> "Period of the live readings")
                .default_value("1000")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            arg!(-o --output <DIR> "Directory for the CSV files")
                .default_value(".")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(--java <PATH> "Java used to start QIS")
                .env("QIS_JAVA")
                .default_value("java")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(--"qis-jar" <PATH> "qis.jar used to start QIS")
                .env("QIS_JAR")
                .default_value("qis.jar")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(--"start-timeout" <SECS> "Time to wait for a started QIS")
                .default_value("20")
                .value_parser(value_parser!(u64)),
        )
        .arg(arg!(
            -d --debug ... "Turn debugging information on"
        ))
        .subcommand(clap::Command::new("stream").about("Stream all modules and write CSV files"))
        .subcommand(
            clap::Command::new("monitor").about("Stream all modules and print live readings"),
        )
        .subcommand(clap::Command::new("all").about("Run stream, then monitor"))
        .subcommand(clap::Command::new("version").about("QIS version"))
        .subcommand(clap::Command::new("list").about("Modules visible to QIS"))
        .subcommand_required(true)
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    init_logging(matches.get_count("debug"));

    let settings = settings_from(&matches);
    if let Err(e) = handle_args(&matches, &settings).await {
        match e {
            QisError::Io(err) => {
                eprintln!("I/O Error: {} [QIS: {}]", err, settings.service_addr());
            }
            QisError::ServiceUnavailable(addr) => {
                eprintln!("QIS is not reachable at {}, is it running?", addr);
            }
            QisError::DeviceNotFound { target, timeout } => {
                eprintln!(
                    "Module {} was not found within {} s, check connection and ID",
                    target,
                    timeout.as_secs()
                );
            }
            QisError::Fail(reason) => {
                eprintln!("Command was rejected by QIS: {}", reason);
            }
            QisError::Abort => {
                eprintln!("Failed to communicate with QIS, aborting!");
            }
            QisError::Unexpected(err) => {
                eprintln!(
                    "Received an unexpected response from QIS, aborting!: {:?}",
                    err
                );
            }
            QisError::InvalidInterval(value) => {
                eprintln!("Invalid resample interval: {}", value);
            }
            QisError::InvalidAddress(value) => {
                eprintln!("Invalid module address: {}", value);
            }
            QisError::Join(err) => {
                eprintln!("Streaming task failed: {}", err);
            }
            QisError::NoModules => {
                eprintln!("No modules given, use --module or QIS_MODULES");
            }
        }
        exit(-1);
    }
}

fn init_logging(debug: u8) {
    let level = match debug {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn settings_from(matches: &clap::ArgMatches) -> Settings {
    let defaults = Settings::default();
    let secs = |id: &str, default: Duration| {
        matches
            .get_one::<u64>(id)
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(default)
    };
    let path = |id: &str, default: PathBuf| {
        matches
            .get_one::<PathBuf>(id)
            .cloned()
            .unwrap_or(default)
    };
    let plan = |id: &str, default: StreamPlan| StreamPlan {
        resample: matches
            .get_one::<ResampleInterval>(id)
            .copied()
            .unwrap_or(default.resample),
        duration: secs("duration", default.duration),
    };

    Settings {
        host: matches
            .get_one::<String>("host")
            .cloned()
            .unwrap_or(defaults.host),
        port: matches.get_one::<u16>("port").copied().unwrap_or(defaults.port),
        modules: matches
            .get_many::<ModuleAddress>("module")
            .map(|m| m.cloned().collect())
            .unwrap_or_default(),
        connect_timeout: secs("connect-timeout", defaults.connect_timeout),
        launcher: Launcher {
            java: path("java", defaults.launcher.java),
            jar: path("qis-jar", defaults.launcher.jar),
            start_timeout: secs("start-timeout", defaults.launcher.start_timeout),
        },
        output_dir: path("output", defaults.output_dir),
        stream: plan("stream-resample", defaults.stream),
        monitor: plan("monitor-resample", defaults.monitor),
        monitor_interval: matches
            .get_one::<u64>("monitor-interval")
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or(defaults.monitor_interval),
        channels: defaults.channels,
    }
}

async fn connect_modules(settings: &Settings) -> Result<Vec<PowerModule>> {
    let addresses = settings.require_modules()?;
    let mut modules = Vec::with_capacity(addresses.len());
    for address in addresses {
        let module = PowerModule::connect(
            settings.service_addr(),
            address.clone(),
            settings.connect_timeout,
        )
        .await?;
        println!("Connected to Module: {}", address);
        modules.push(module);
    }
    Ok(modules)
}

async fn handle_args(matches: &clap::ArgMatches, settings: &Settings) -> Result<()> {
    if matches!(matches.subcommand_name(), Some("stream" | "monitor" | "all")) {
        settings.require_modules()?;
    }

    println!("\n\nQuarch application note example: AN-032");
    println!("---------------------------------------\n\n");

    println!("Starting QIS...\n");
    let service = QisService::ensure_running(settings.service_addr(), &settings.launcher).await?;

    let outcome = run_subcommand(matches, settings, &service).await;
    let closed = service.close().await;
    outcome?;
    closed
}

async fn run_subcommand(
    matches: &clap::ArgMatches,
    settings: &Settings,
    service: &QisService,
) -> Result<()> {
    let mut qis = service.interface().await?;
    println!("QIS Version: {}", qis.version().await?);

    match matches.subcommand() {
        Some(("version", _)) => {}
        Some(("list", _)) => {
            let devices = qis.list_devices().await?;
            if devices.is_empty() {
                println!("No modules found");
            }
            for device in devices {
                println!("{}", device);
            }
        }
        Some((name @ ("stream" | "monitor" | "all"), _)) => {
            let mut modules = connect_modules(settings).await?;
            if name != "monitor" {
                run::multi_stream(&mut modules, &settings.stream, &settings.output_dir).await?;
            }
            if name != "stream" {
                run::live_monitoring(
                    &mut modules,
                    &settings.monitor,
                    &settings.channels,
                    settings.monitor_interval,
                )
                .await?;
            }
        }
        _ => unreachable!("subcommand is required"),
    }
    Ok(())
}
