pub mod models {
    pub mod telemetry;
}

pub mod client;
pub mod config;
pub mod registry;
pub mod store;
pub mod utils;
pub mod services {
    pub mod aggregation;
    pub mod fake_data;
    pub mod poll;
}

use crate::client::ProviderClient;
use crate::config::Config;
use crate::registry::{DeviceRegistryClient, RegistryApi};
use crate::services::aggregation::AggregationService;
use crate::services::fake_data::FakeProvider;
use crate::services::poll;
use crate::store::{ReadingStore, ScanApi};
use log::{error, info};
use std::path::{Path, PathBuf};

pub fn run() -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (table={}, group={}, poll_interval={}s, past_hours={}, fake_data={})",
        cfg.table_name,
        cfg.thing_group,
        cfg.poll_interval.as_secs(),
        cfg.past_hours,
        cfg.fake_data
    );

    // 2) Construct provider backends and hand off
    if cfg.fake_data {
        info!("FAKE_DATA enabled; serving synthetic readings from memory");
        let provider = FakeProvider::generate(&cfg.thing_group, &cfg.table_name);
        serve(&cfg, provider.clone(), provider)
    } else {
        let provider = ProviderClient::new(
            &cfg.registry_url,
            &cfg.store_url,
            cfg.api_token.clone(),
            cfg.request_timeout,
        );
        serve(&cfg, provider.clone(), provider)
    }
}

fn serve<S: ScanApi, R: RegistryApi>(cfg: &Config, scan: S, listing: R) -> Result<(), String> {
    // Table binding is fatal on failure: with no valid table there is
    // nothing to query.
    let store = ReadingStore::bind(scan, cfg.table_name.clone())
        .map_err(|e| format!("binding table {} failed: {}", cfg.table_name, e))?;
    info!("Bound reading table {}", store.table());

    let registry = DeviceRegistryClient::new(listing);
    let service = AggregationService::new(store, registry);

    let devices = service
        .device_list(&cfg.thing_group)
        .map_err(|e| format!("initial device listing failed: {}", e))?;
    info!("Discovered {} device(s) in group {}", devices.len(), cfg.thing_group);

    poll::run_loop(&service, &cfg.thing_group, cfg.poll_interval, cfg.past_hours);
    Ok(())
}

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

fn configure_env_from_cli() -> Result<Option<LoadedEnvFile>, String> {
    let mut args = std::env::args_os();
    args.next(); // skip program name

    let mut env_file: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("--env-file") => {
                if env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let value = args
                    .next()
                    .ok_or_else(|| "`--env-file` requires a path argument".to_string())?;
                env_file = Some(PathBuf::from(value));
            }
            Some(s) if s.starts_with("--env-file=") => {
                if env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let path_str = &s["--env-file=".len()..];
                if path_str.is_empty() {
                    return Err("`--env-file` requires a path argument".to_string());
                }
                env_file = Some(PathBuf::from(path_str));
            }
            Some("--") => break,
            Some(other) => return Err(format!("unrecognised argument: {}", other)),
            None => return Err("argument contains invalid UTF-8".to_string()),
        }
    }

    if let Some(path) = env_file {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        load_env_file(&path)?;
        Ok(Some(LoadedEnvFile { path, explicit: true }))
    } else {
        let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
        let default_path = cwd.join(".env");
        if default_path.is_file() {
            load_env_file(&default_path)?;
            Ok(Some(LoadedEnvFile {
                path: default_path,
                explicit: false,
            }))
        } else {
            Ok(None)
        }
    }
}

fn load_env_file(path: &Path) -> Result<(), String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;

    for (index, line) in contents.lines().enumerate() {
        match parse_env_assignment(line) {
            Ok(Some((key, value))) => {
                // Preserve any value that was already supplied via the process environment.
                if std::env::var_os(&key).is_none() {
                    // Updating process-level environment variables is unsafe on some targets.
                    unsafe {
                        std::env::set_var(key, value);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                return Err(format!("{}:{}: {}", path.display(), index + 1, e));
            }
        }
    }

    Ok(())
}

fn parse_env_assignment(line: &str) -> Result<Option<(String, String)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let without_export = trimmed
        .strip_prefix("export ")
        .map(|s| s.trim_start())
        .unwrap_or(trimmed);

    let (key, value_part) = without_export
        .split_once('=')
        .ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("environment variable name cannot be empty".to_string());
    }
    if key.chars().any(|c| c.is_whitespace()) {
        return Err(format!("environment variable name contains whitespace: {}", key));
    }

    let value = value_part.trim();
    let value = if let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        inner.to_string()
    } else if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        inner.to_string()
    } else {
        value.split('#').next().unwrap_or_default().trim_end().to_string()
    };

    Ok(Some((key.to_string(), value)))
}

fn main() {
    let loaded_env = match configure_env_from_cli() {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "device-energy-api {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run() {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
