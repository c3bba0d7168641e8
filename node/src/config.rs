use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File as ConfigFile};
use moniker_allocator::{DEFAULT_MAX_ATTEMPTS, DEFAULT_PROBE_TIMEOUT};
use moniker_registry::{
    RegistryConfig, DEFAULT_DOMAIN_SUFFIX, DEFAULT_MAX_DOMAINS_PER_USER, DEFAULT_REGISTRATION_FEE,
};
use moniker_signer::{
    SigningDomain, DEFAULT_AUTHORIZATION_TTL_SECS, DEFAULT_DOMAIN_NAME, DEFAULT_DOMAIN_VERSION,
    DEFAULT_NETWORK_ID,
};
use moniker_types::{Address, WordCorpus};

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    pub config_path: Option<PathBuf>,
    pub node_id: String,

    // Network
    pub rpc_host: String,
    pub rpc_port: u16,
    pub request_timeout_ms: u64,
    pub network_id: u64,

    // Storage
    pub data_dir: Option<PathBuf>,

    // Registry
    pub registry_address: Address,
    pub registry_admin: Address,
    pub max_domains_per_user: usize,
    pub registration_fee: u128,
    pub domain_suffix: String,

    // Signer
    pub signer_seed: Option<String>,
    pub signer_ttl_secs: u64,
    pub signer_domain_name: String,
    pub signer_domain_version: String,

    // Allocator
    pub allocator_max_attempts: u32,
    pub allocator_probe_timeout_ms: u64,

    pub corpus_path: Option<PathBuf>,

    // Observability
    pub prometheus_enabled: bool,
    pub log_level: String,
    pub log_format: String,
}

impl AppConfig {
    pub fn load(config_path_override: Option<&str>) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path)
            }
            None => None,
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(
            Environment::with_prefix("MONIKER")
                .prefix_separator("_")
                .separator("__"),
        );
        let config = builder.build().context("failed to read configuration")?;

        Ok(Self {
            config_path: resolved_path,
            node_id: get_string_value(&config, &["node_id"])
                .unwrap_or_else(|| "moniker-node".to_string()),
            rpc_host: get_string_value(&config, &["rpc.host"])
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            rpc_port: parse_value(&config, "rpc.port", 8080)?,
            request_timeout_ms: parse_value(&config, "rpc.request_timeout_ms", 10_000)?,
            network_id: parse_value(&config, "network.id", DEFAULT_NETWORK_ID)?,
            data_dir: get_string_value(&config, &["storage.data_dir"]).map(PathBuf::from),
            registry_address: parse_value(&config, "registry.address", Address::ZERO)?,
            registry_admin: parse_value(&config, "registry.admin", Address::ZERO)?,
            max_domains_per_user: parse_value(
                &config,
                "registry.max_domains_per_user",
                DEFAULT_MAX_DOMAINS_PER_USER,
            )?,
            registration_fee: parse_value(
                &config,
                "registry.registration_fee",
                DEFAULT_REGISTRATION_FEE,
            )?,
            domain_suffix: get_string_value(&config, &["registry.domain_suffix"])
                .unwrap_or_else(|| DEFAULT_DOMAIN_SUFFIX.to_string()),
            signer_seed: get_string_value(&config, &["signer.seed"]),
            signer_ttl_secs: parse_value(
                &config,
                "signer.ttl_secs",
                DEFAULT_AUTHORIZATION_TTL_SECS,
            )?,
            signer_domain_name: get_string_value(&config, &["signer.domain_name"])
                .unwrap_or_else(|| DEFAULT_DOMAIN_NAME.to_string()),
            signer_domain_version: get_string_value(&config, &["signer.domain_version"])
                .unwrap_or_else(|| DEFAULT_DOMAIN_VERSION.to_string()),
            allocator_max_attempts: parse_value(&config, "allocator.max_attempts", DEFAULT_MAX_ATTEMPTS)?,
            allocator_probe_timeout_ms: parse_value(
                &config,
                "allocator.probe_timeout_ms",
                DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
            )?,
            corpus_path: get_string_value(&config, &["corpus.path"]).map(PathBuf::from),
            prometheus_enabled: get_bool_value(&config, &["metrics.enabled"], true),
            log_level: get_string_value(&config, &["log.level"])
                .unwrap_or_else(|| "info".to_string()),
            log_format: get_string_value(&config, &["log.format"])
                .unwrap_or_else(|| "pretty".to_string()),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            anyhow::bail!("node_id must not be empty");
        }
        if self.rpc_port == 0 {
            anyhow::bail!("rpc.port must be greater than zero");
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("rpc.request_timeout_ms must be greater than zero");
        }
        if self.registry_address.is_zero() {
            anyhow::bail!("registry.address must be set to a non-zero address");
        }
        if self.registry_admin.is_zero() {
            anyhow::bail!("registry.admin must be set to a non-zero address");
        }
        if self.max_domains_per_user == 0 {
            anyhow::bail!("registry.max_domains_per_user must be greater than zero");
        }
        if self.signer_seed.is_none() {
            anyhow::bail!(
                "signer.seed is required; generate one with `moniker-node keygen` or set MONIKER_SIGNER__SEED"
            );
        }
        if self.signer_ttl_secs == 0 {
            anyhow::bail!("signer.ttl_secs must be greater than zero");
        }
        if self.allocator_max_attempts == 0 {
            anyhow::bail!("allocator.max_attempts must be greater than zero");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            anyhow::bail!(
                "log.format must be 'pretty' or 'json', got '{}'",
                self.log_format
            );
        }
        Ok(())
    }

    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_host, self.rpc_port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.allocator_probe_timeout_ms)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            address: self.registry_address,
            admin: self.registry_admin,
            max_domains_per_user: self.max_domains_per_user,
            registration_fee: self.registration_fee,
            domain_suffix: self.domain_suffix.clone(),
        }
    }

    pub fn signing_domain(&self) -> SigningDomain {
        SigningDomain::new(
            self.signer_domain_name.clone(),
            self.signer_domain_version.clone(),
            self.network_id,
            self.registry_address,
        )
    }

    /// Corpus from `corpus.path`, or the built-in one.
    pub fn load_corpus(&self) -> Result<WordCorpus> {
        match &self.corpus_path {
            Some(path) => load_corpus_file(path),
            None => Ok(WordCorpus::builtin()),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("config_path", &self.config_path)
            .field("node_id", &self.node_id)
            .field("rpc", &self.rpc_addr())
            .field("network_id", &self.network_id)
            .field("data_dir", &self.data_dir)
            .field("registry_address", &self.registry_address)
            .field("registry_admin", &self.registry_admin)
            .field("signer_seed", &self.signer_seed.as_ref().map(|_| "<redacted>"))
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

fn load_corpus_file(path: &Path) -> Result<WordCorpus> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read corpus file {}", path.display()))?;
    let corpus: WordCorpus = toml::from_str(&raw)
        .with_context(|| format!("failed to parse corpus file {}", path.display()))?;
    corpus
        .validate()
        .with_context(|| format!("invalid corpus in {}", path.display()))?;
    Ok(corpus)
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_bool_value(config: &Config, keys: &[&str], default: bool) -> bool {
    for key in keys {
        if let Ok(value) = config.get_bool(key) {
            return value;
        }
        if let Ok(raw) = config.get_string(key) {
            if let Ok(parsed) = raw.parse::<bool>() {
                return parsed;
            }
        }
    }
    default
}

fn parse_value<T>(config: &Config, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match get_string_value(config, &[key]) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("invalid value for {key} ('{raw}'): {err}")),
        None => Ok(default),
    }
}

pub fn apply_overrides(matches: &clap::ArgMatches, config: &mut AppConfig) {
    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.data_dir = Some(PathBuf::from(data_dir));
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }

    if let Some(rpc_host) = matches.get_one::<String>("rpc-host") {
        config.rpc_host = rpc_host.clone();
    }

    if let Some(rpc_port) = matches.get_one::<u16>("rpc-port") {
        config.rpc_port = *rpc_port;
    }

    if let Some(corpus) = matches.get_one::<String>("corpus") {
        config.corpus_path = Some(PathBuf::from(corpus));
    }

    if matches.get_flag("disable-metrics") {
        config.prometheus_enabled = false;
    }
}

pub fn load_config_with_overrides(matches: &clap::ArgMatches) -> Result<AppConfig> {
    let config_path = matches
        .get_one::<String>("config")
        .map(|value| value.as_str());
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(matches, &mut config);
    config.validate()?;
    Ok(config)
}
