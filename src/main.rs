mod analyzer;
mod config;
mod error;
mod export;
mod platforms;
mod probe;
mod registry;
mod report;
mod traits;
mod types;
mod utils;

use analyzer::Analyzer;
use anyhow::{anyhow, bail, Result};
use clap::{ArgAction, Parser, Subcommand};
use config::Settings;
use export::ExportFormat;
use platforms::get_manager;
use registry::Registry;
use report::BarObserver;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use types::{ResultSet, ServerEntry};

#[derive(Parser)]
#[command(name = "dnspick")]
#[command(about = "Find the fastest DNS server and switch to it", long_about = None)]
struct Cli {
    /// Probe timeout per server in milliseconds (default: 2000 or config.toml)
    #[arg(long, global = true, value_name = "MS")]
    timeout: Option<u64>,

    /// Increase log verbosity (-v, -vv)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the DNS servers the system currently uses
    Status,
    /// List the servers that will be tested
    List,
    /// Measure latency of all servers (e.g., dnspick test --add 94.140.14.14)
    Test {
        /// Extra server address for this run only (repeatable)
        #[arg(long = "add", value_name = "ADDRESS")]
        add: Vec<String>,

        /// Write a summary of the run to this file
        #[arg(long, value_name = "PATH")]
        export: Option<PathBuf>,

        /// Summary format
        #[arg(long, value_enum, default_value_t = ExportFormat::Text)]
        format: ExportFormat,
    },
    /// Switch the system DNS (e.g., dnspick use --fastest)
    Use {
        /// Server name (e.g., Cloudflare)
        #[arg(required_unless_present = "fastest")]
        server: Option<String>,

        /// Benchmark first and apply the fastest server
        #[arg(long, short)]
        fastest: bool,

        /// Extra server address to include in the benchmark (repeatable)
        #[arg(long = "add", value_name = "ADDRESS")]
        add: Vec<String>,
    },
    /// Restore the previous DNS configuration
    Restore,
    /// Save a custom server to config.toml
    Add {
        /// IP address of the DNS server
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Status => handle_status().await?,
        Commands::List => handle_list(cli.timeout)?,
        Commands::Test { add, export, format } => {
            handle_test(cli.timeout, &add, export, format).await?
        }
        Commands::Use {
            server,
            fastest,
            add,
        } => handle_use(cli.timeout, server, fastest, &add).await?,
        Commands::Restore => handle_restore().await?,
        Commands::Add { address } => handle_add(&address)?,
    }

    Ok(())
}

/// 日志写到 stderr，stdout 只保留结果; RUST_LOG 优先
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

// --- Handlers ---

fn build_registry(add: &[String]) -> Result<Registry> {
    let registry = config::settings().build_registry();
    for address in add {
        registry.add(address)?;
    }
    Ok(registry)
}

async fn run_analysis(timeout: Option<u64>, registry: &Registry) -> Result<ResultSet> {
    let timeout = config::settings().timeout(timeout)?;
    let analyzer = Analyzer::new(timeout);

    let observer = Arc::new(BarObserver::new(registry.len()));
    let result = analyzer.run(registry, observer.clone()).await;
    observer.finish();

    println!(); // Newline after progress bar
    Ok(result)
}

async fn current_system_servers() -> Vec<String> {
    match get_manager(std::env::consts::OS) {
        Ok(manager) => manager.current_servers().await.unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

async fn handle_status() -> Result<()> {
    let manager = get_manager(std::env::consts::OS)?;
    let servers = manager.current_servers().await?;
    let known = config::settings().build_registry().snapshot();

    println!("{}", "-".repeat(50));
    println!("{:<20} Name", "Current DNS");
    println!("{}", "-".repeat(50));

    if servers.is_empty() {
        println!("{:<20} [Unknown/Default]", "-");
    }
    for address in servers {
        let name = known
            .iter()
            .find(|e| e.address == address)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| "Custom".to_string());
        println!("{:<20} [{}]", address, name);
    }
    println!("{}", "-".repeat(50));
    println!("Platform: {}, managed via: {:?}", manager.name(), manager.config_path());

    Ok(())
}

fn handle_list(timeout: Option<u64>) -> Result<()> {
    let settings = config::settings();
    let registry = settings.build_registry();

    println!("{:<28} ADDRESS", "NAME");
    println!("{}", "-".repeat(50));
    for entry in registry.snapshot() {
        println!("{:<28} {}", entry.name, entry.address);
    }
    println!("{}", "-".repeat(50));
    println!("Timeout: {} ms", settings.timeout(timeout)?.as_millis());
    if let Some(path) = config::config_path() {
        println!("Config:  {:?}", path);
    }
    Ok(())
}

async fn handle_test(
    timeout: Option<u64>,
    add: &[String],
    export: Option<PathBuf>,
    format: ExportFormat,
) -> Result<()> {
    let registry = build_registry(add)?;
    let result = run_analysis(timeout, &registry).await?;

    print!("{}", report::render_table(&result));
    println!("{}", "-".repeat(60));
    println!("{}/{} servers responded.", result.responded(), result.len());
    println!(
        "{}",
        report::recommendation(&result, &current_system_servers().await)
    );

    if let Some(winner) = result.winner() {
        println!("Run 'dnspick use {}' to apply.", winner.name);
    }

    if let Some(path) = export {
        export::write_summary(&path, &result, format).await?;
        println!("Summary exported to {:?}", path);
    }

    Ok(())
}

async fn handle_use(
    timeout: Option<u64>,
    server: Option<String>,
    fastest: bool,
    add: &[String],
) -> Result<()> {
    let manager = get_manager(std::env::consts::OS)?;

    // 检查权限
    if manager.requires_sudo() {
        eprintln!("Note: Changing system DNS usually requires sudo/administrator permissions.");
    }

    let registry = build_registry(add)?;

    let target: ServerEntry = if fastest {
        println!("Finding fastest DNS server...");
        let result = run_analysis(timeout, &registry).await?;

        let best = match result.winner_outcome() {
            Some(best) => best,
            None => bail!("No DNS server responded. Please check your network connection."),
        };
        println!(
            "Fastest DNS server is {} ({}) - {}",
            best.entry.name,
            best.entry.address,
            best.latency_display().unwrap_or_default()
        );
        best.entry.clone()
    } else {
        // clap 的 required_unless_present = "fastest" 保证了 server 存在
        let name = server.ok_or_else(|| anyhow!("Missing server name"))?;
        match registry.get(&name) {
            Some(entry) => entry,
            None => bail!(error::DnsError::UnknownServer(format!(
                "'{}'. Use 'list' to see available servers.",
                name
            ))),
        }
    };

    println!("Applying {} ({})...", target.name, target.address);
    if let Err(e) = manager.apply(&target.address).await {
        bail!("Failed to change DNS settings: {}", e);
    }
    println!("Success! System DNS is now {} ({}).", target.name, target.address);

    Ok(())
}

async fn handle_restore() -> Result<()> {
    let manager = get_manager(std::env::consts::OS)?;

    if manager.requires_sudo() {
        eprintln!("Note: Restoring system DNS usually requires sudo/administrator permissions.");
    }

    println!("Restoring DNS configuration...");
    manager.restore().await?;
    println!("Success! DNS configuration restored.");

    Ok(())
}

fn handle_add(address: &str) -> Result<()> {
    let path = config::config_path()
        .ok_or_else(|| anyhow!("Cannot determine the configuration directory"))?;

    let mut settings = if path.exists() {
        Settings::load_from(&path)?
    } else {
        Settings::default()
    };

    let server = settings.add_server(address)?;
    settings.save_to(&path)?;

    println!("Added {} to test list ({:?}).", server.address, path);
    Ok(())
}
