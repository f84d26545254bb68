use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use fabfriend::azure::auth;
use fabfriend::azure::http::format_azure_error;
use fabfriend::config::Config;
use fabfriend::dispatch::{dispatch, ArgumentSet, DispatchError, Registry, ResultEnvelope};
use fabfriend::output::table::{display_records, Columns};
use serde_json::Value;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Fabric and Power BI management tool for Azure
#[derive(Parser, Debug)]
#[command(name = "fabfriend", version = fabfriend::VERSION, about, long_about = None)]
struct Args {
    /// Azure subscription id (falls back to saved config, then the az CLI default)
    #[arg(short, long, global = true)]
    subscription_id: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List Microsoft Fabric capacities
    Fabric {
        /// Resource group to filter by
        #[arg(short = 'g', long)]
        resource_group: Option<String>,
        /// Capacity name or full resource id to look up
        #[arg(long)]
        capacity: Option<String>,
    },
    /// List Power BI Premium capacities
    Powerbi {
        /// Resource group to filter by
        #[arg(short = 'g', long)]
        resource_group: Option<String>,
        /// Capacity name or full resource id to look up
        #[arg(long)]
        capacity: Option<String>,
    },
    /// Map Azure resource topology
    Topology {
        /// Resource group to filter by
        #[arg(short = 'g', long)]
        resource_group: Option<String>,
        /// Resource id to fetch dependencies for
        #[arg(long)]
        resource_id: Option<String>,
        /// Resource type to filter by (e.g. Microsoft.Web/sites)
        #[arg(short = 't', long)]
        resource_type: Option<String>,
        /// Export topology CSV files instead of printing
        #[arg(long)]
        export: bool,
        /// Output directory for exported files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Build an HTML report from previously exported files
    Reports {
        /// Directory holding the exported CSV files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Check authentication status with Azure
    Auth,
    /// List the available modules
    Modules,
    /// Dispatch a module by name
    Run {
        /// Module identifier
        module: String,
        /// Named command within the module
        #[arg(short, long)]
        command: Option<String>,
        /// Resource group to filter by
        #[arg(short = 'g', long)]
        resource_group: Option<String>,
        /// Resource name or full resource id
        #[arg(long)]
        resource_id: Option<String>,
        /// Extra key=value parameters forwarded verbatim to the module
        #[arg(short = 'e', long = "extra", value_parser = parse_key_val)]
        extras: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid key=value pair: {s:?}"))?;
    Ok((key.to_string(), value.to_string()))
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .expect("Failed to open log file");

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("fabfriend started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("fabfriend").join("fabfriend.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".fabfriend").join("fabfriend.log");
    }
    PathBuf::from("fabfriend.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load();

    // Remember an explicitly passed subscription for the next invocation
    if let Some(subscription) = &args.subscription_id {
        if let Err(e) = config.set_subscription(subscription) {
            tracing::warn!("Failed to save config: {:#}", e);
        }
    }

    let subscription = args
        .subscription_id
        .clone()
        .unwrap_or_else(|| config.effective_subscription());

    match args.command {
        Command::Auth => {
            println!("Checking authentication status...");
            if auth::check_auth().await {
                println!("Azure authentication successful");
            } else {
                println!("Azure authentication failed. Login using 'az login' or 'azd auth login'.");
            }
            Ok(())
        }
        Command::Modules => {
            println!("Available modules:");
            let registry = Registry::builtin();
            for name in registry.names() {
                // resolve never fails for names the registry just reported
                let handle = registry.resolve(name)?;
                println!("  {:<10} {}", handle.name(), handle.description());
            }
            Ok(())
        }
        Command::Fabric {
            resource_group,
            capacity,
        } => {
            let mut module_args = ArgumentSet::new(subscription);
            module_args.resource_group = resource_group;
            module_args.resource_id = capacity;
            println!("Fetching Microsoft Fabric capacities...");
            run_dispatch("fabric", module_args, None).await
        }
        Command::Powerbi {
            resource_group,
            capacity,
        } => {
            let mut module_args = ArgumentSet::new(subscription);
            module_args.resource_group = resource_group;
            module_args.resource_id = capacity;
            println!("Fetching Power BI Premium capacities...");
            run_dispatch("powerbi", module_args, None).await
        }
        Command::Topology {
            resource_group,
            resource_id,
            resource_type,
            export,
            output_dir,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| config.effective_output_dir());
            let mut module_args = ArgumentSet::new(subscription)
                .with_extra("output_dir", output_dir.display().to_string());
            if let Some(resource_type) = resource_type {
                module_args = module_args.with_extra("resource_type", resource_type);
            }
            module_args.resource_group = resource_group;
            module_args.resource_id = resource_id;
            let command = export.then_some("export");
            run_dispatch("topology", module_args, command).await
        }
        Command::Reports { output_dir } => {
            let output_dir = output_dir.unwrap_or_else(|| config.effective_output_dir());
            let module_args = ArgumentSet::new(subscription)
                .with_extra("output_dir", output_dir.display().to_string());
            run_dispatch("reports", module_args, None).await
        }
        Command::Run {
            module,
            command,
            resource_group,
            resource_id,
            extras,
        } => {
            let mut module_args = ArgumentSet::new(subscription);
            module_args.resource_group = resource_group;
            module_args.resource_id = resource_id;
            for (key, value) in extras {
                module_args.extras.insert(key, Value::String(value));
            }
            run_dispatch(&module, module_args, command.as_deref()).await
        }
    }
}

async fn run_dispatch(
    module: &str,
    module_args: ArgumentSet,
    command: Option<&str>,
) -> Result<()> {
    match dispatch(module, module_args, command).await {
        Ok(envelope) => render_envelope(module, &envelope),
        Err(err) => {
            if let DispatchError::ModuleNotFound(_) = &err {
                eprintln!(
                    "Available modules: {}",
                    Registry::builtin().names().join(", ")
                );
            }
            if let DispatchError::Execution { source, .. } = &err {
                eprintln!("Hint: {}", format_azure_error(source));
            }
            Err(err.into())
        }
    }
}

const CAPACITY_COLUMNS: Columns<'static> = &[
    ("name", "Name"),
    ("location", "Location"),
    ("sku_display", "SKU"),
    ("state_display", "State"),
];

const POWERBI_COLUMNS: Columns<'static> = &[
    ("name", "Name"),
    ("location", "Location"),
    ("sku_display", "SKU"),
    ("state_display", "State"),
    ("admins_count", "Admins"),
];

const NODE_COLUMNS: Columns<'static> = &[
    ("name", "Name"),
    ("kind", "Kind"),
    ("location", "Location"),
];

const DEPENDENCY_COLUMNS: Columns<'static> = &[
    ("name", "Name"),
    ("type", "Type"),
    ("location", "Location"),
];

fn render_envelope(module: &str, envelope: &ResultEnvelope) -> Result<()> {
    match module {
        "fabric" => render_capacities("Fabric capacities", CAPACITY_COLUMNS, envelope),
        "powerbi" => render_capacities("Power BI Premium capacities", POWERBI_COLUMNS, envelope),
        "topology" => render_topology(envelope),
        "reports" => {
            if let Some(report) = envelope.data.get("report").and_then(|v| v.as_str()) {
                println!("Report generated at {report}");
            }
            Ok(())
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(&envelope.data)?);
            Ok(())
        }
    }
}

fn render_capacities(title: &str, columns: Columns, envelope: &ResultEnvelope) -> Result<()> {
    if let Some(instances) = envelope.records("instances") {
        display_records(title, columns, instances);
        return Ok(());
    }
    if let Some(instance) = envelope.data.get("instance") {
        println!("{}", serde_json::to_string_pretty(instance)?);
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&envelope.data)?);
    Ok(())
}

fn render_topology(envelope: &ResultEnvelope) -> Result<()> {
    if let Some(files) = envelope.records("files") {
        println!("Exported files:");
        for file in files {
            if let Some(path) = file.as_str() {
                println!("  {path}");
            }
        }
        return Ok(());
    }

    if let Some(dependencies) = envelope.records("dependencies") {
        display_records("Dependencies", DEPENDENCY_COLUMNS, dependencies);
        return Ok(());
    }

    if let Some(topology) = envelope.data.get("topology") {
        let nodes = topology
            .get("nodes")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let connections = topology
            .get("connections")
            .and_then(|v| v.as_array())
            .map(Vec::len)
            .unwrap_or(0);
        display_records("Topology nodes", NODE_COLUMNS, &nodes);
        println!("{} connections", connections);
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&envelope.data)?);
    Ok(())
}
