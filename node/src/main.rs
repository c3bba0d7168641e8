use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use moniker_allocator::{AllocationService, LocalRegistryReader, RetryPolicy};
use moniker_registry::{MemoryRegistryStore, Registry, RegistryStore, SledRegistryStore};
use moniker_rpc::{start_server, AppState};
use moniker_signer::{CapabilitySigner, SigningDomain};
use moniker_types::Address;
use rand_core::{OsRng, RngCore};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod version;

use config::{load_config_with_overrides, AppConfig};
use version::{git_commit_hash, MONIKER_VERSION};

fn build_cli() -> Command {
    Command::new("moniker-node")
        .version(MONIKER_VERSION)
        .about("Allocates random three-word monikers and records their registration")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .global(true),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Directory for the persistent registry store")
                .global(true),
        )
        .arg(
            Arg::new("corpus")
                .long("corpus")
                .value_name("FILE")
                .help("TOML word corpus replacing the built-in one")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .global(true),
        )
        .arg(
            Arg::new("rpc-host")
                .long("rpc-host")
                .value_name("HOST")
                .global(true),
        )
        .arg(
            Arg::new("rpc-port")
                .long("rpc-port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .global(true),
        )
        .arg(
            Arg::new("disable-metrics")
                .long("disable-metrics")
                .help("Do not install the Prometheus exporter")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("start").about("Start the allocation and registry service"))
        .subcommand(
            Command::new("keygen")
                .about("Generate a fresh capability signing seed")
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Write the seed to FILE instead of stdout"),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("Overwrite an existing output file")
                        .action(ArgAction::SetTrue),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("keygen", sub)) => run_keygen(sub),
        _ => {
            let config = load_config_with_overrides(&matches)?;
            init_logging(&config)?;
            run_node(config).await
        }
    }
}

async fn run_node(config: AppConfig) -> Result<()> {
    info!(
        version = MONIKER_VERSION,
        commit = git_commit_hash(),
        node_id = %config.node_id,
        "Starting moniker node"
    );
    if let Some(path) = &config.config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let metrics = init_metrics(&config);

    let seed = config
        .signer_seed
        .as_deref()
        .context("signer.seed is not configured")?;
    let signer = CapabilitySigner::from_seed_hex(seed, config.signing_domain())
        .context("invalid signer.seed")?
        .with_ttl(config.signer_ttl_secs)?;
    info!(
        public_key = %hex::encode(signer.verifying_key().to_bytes()),
        ttl_secs = signer.ttl_secs(),
        "Capability signer ready"
    );

    let store = open_store(config.data_dir.as_deref())?;
    let corpus = config.load_corpus()?;
    let registry = Arc::new(
        Registry::open(config.registry_config(), signer.verifier(), corpus, store)
            .context("failed to open registry")?,
    );

    let policy = RetryPolicy::new(config.allocator_max_attempts, config.probe_timeout())?;
    let reader = Arc::new(LocalRegistryReader::new(registry.clone()));
    let allocator = Arc::new(AllocationService::new(Arc::new(signer), reader, policy));

    let mut state = AppState::new(
        registry,
        allocator,
        config.request_timeout(),
        config.node_id.clone(),
    );
    if let Some(handle) = metrics {
        state = state.with_metrics(handle);
    }

    start_server(state, &config.rpc_addr()).await?;
    info!("Moniker node stopped");
    Ok(())
}

fn open_store(data_dir: Option<&Path>) -> Result<Arc<dyn RegistryStore>> {
    match data_dir {
        Some(dir) => {
            let path = dir.join("registry");
            fs::create_dir_all(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let store = SledRegistryStore::open(&path)
                .with_context(|| format!("failed to open registry store at {}", path.display()))?;
            info!("Registry store opened at {}", path.display());
            Ok(Arc::new(store))
        }
        None => {
            warn!("No data_dir configured; registry state will not survive a restart");
            Ok(Arc::new(MemoryRegistryStore::new()))
        }
    }
}

fn run_keygen(matches: &ArgMatches) -> Result<()> {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    let seed_hex = hex::encode(seed);
    let signer = CapabilitySigner::new(seed, SigningDomain::for_target(Address::ZERO));
    seed.fill(0);
    let public_key = hex::encode(signer.verifying_key().to_bytes());

    match matches.get_one::<String>("output") {
        Some(output) => {
            let path = PathBuf::from(output);
            if path.exists() && !matches.get_flag("force") {
                anyhow::bail!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                );
            }
            fs::write(&path, format!("{seed_hex}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Seed written to {}", path.display());
        }
        None => println!("seed: {seed_hex}"),
    }
    println!("public_key: {public_key}");
    Ok(())
}

fn init_metrics(config: &AppConfig) -> Option<PrometheusHandle> {
    if !config.prometheus_enabled {
        info!("Prometheus metrics exporter disabled via configuration");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("Prometheus metrics exporter registered");
            describe_counter!(
                "moniker_registrations_total",
                "Domains successfully registered, by mode"
            );
            describe_counter!(
                "moniker_registration_failures_total",
                "Rejected registrations, by mode and reason"
            );
            describe_counter!(
                "moniker_allocations_total",
                "Authorizations issued by the allocator"
            );
            describe_counter!(
                "moniker_allocation_failures_total",
                "Allocation requests that ended without an authorization"
            );
            Some(handle)
        }
        Err(err) => {
            warn!("Failed to install Prometheus metrics exporter: {}", err);
            None
        }
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::apply_overrides;

    fn fixture_config() -> String {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("config")
            .join("moniker.toml")
            .display()
            .to_string()
    }

    #[test]
    fn cli_overrides_take_precedence() {
        let config_path = fixture_config();
        let matches = build_cli().get_matches_from([
            "moniker-node",
            "--config",
            config_path.as_str(),
            "--rpc-port",
            "9191",
            "--log-format",
            "json",
            "--disable-metrics",
            "start",
        ]);
        let mut config = AppConfig::load(Some(config_path.as_str())).unwrap();
        assert!(config.prometheus_enabled);

        apply_overrides(&matches, &mut config);
        assert_eq!(config.rpc_port, 9191);
        assert_eq!(config.log_format, "json");
        assert!(!config.prometheus_enabled);
        assert_eq!(config.rpc_addr(), "127.0.0.1:9191");
    }

    #[test]
    fn keygen_writes_seed_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("signer.seed");
        let output_arg = output.display().to_string();

        let matches =
            build_cli().get_matches_from(["moniker-node", "keygen", "--output", output_arg.as_str()]);
        let (_, sub) = matches.subcommand().unwrap();
        run_keygen(sub).unwrap();

        let seed = fs::read_to_string(&output).unwrap();
        let seed = seed.trim();
        assert_eq!(seed.len(), 64);
        assert!(CapabilitySigner::from_seed_hex(seed, SigningDomain::for_target(Address::ZERO)).is_ok());

        assert!(run_keygen(sub).is_err());
    }

    #[test]
    fn store_is_persistent_only_with_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_store(Some(dir.path())).is_ok());
        assert!(dir.path().join("registry").is_dir());
        assert!(open_store(None).is_ok());
    }
}
