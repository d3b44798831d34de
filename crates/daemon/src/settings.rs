//! Layered configuration: defaults, optional file, `GANTRY__*` environment

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use gantry_core::EngineConfig;
use std::path::{Path, PathBuf};

/// Overrides the config file location
pub const CONFIG_PATH_ENV: &str = "GANTRY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "~/.gantry/config.yaml";
const ENV_PREFIX: &str = "GANTRY";
const ENV_SEPARATOR: &str = "__";

/// Location of the optional config file
pub fn config_path() -> PathBuf {
    let raw = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    expand(Path::new(&raw))
}

/// Load and validate the engine config from the process environment
pub fn load() -> Result<EngineConfig> {
    let env = Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);
    load_layers(&config_path(), env)
}

fn load_layers(file: &Path, env: Environment) -> Result<EngineConfig> {
    let defaults =
        Config::try_from(&EngineConfig::default()).context("failed to encode default config")?;

    let settings = Config::builder()
        .add_source(defaults)
        .add_source(File::from(file).required(false))
        .add_source(env)
        .build()
        .with_context(|| format!("failed to read config from {}", file.display()))?;

    let mut engine: EngineConfig = settings
        .try_deserialize()
        .context("config does not match the expected shape")?;
    expand_paths(&mut engine);
    engine.validate().context("invalid configuration")?;
    Ok(engine)
}

fn expand_paths(engine: &mut EngineConfig) {
    engine.ingestion.watch_root = expand(&engine.ingestion.watch_root);
    engine.paths.database = expand(&engine.paths.database);
    engine.paths.workflows = expand(&engine.paths.workflows);
    if let Some(root) = engine.backend.template_root.as_mut() {
        *root = expand(root);
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
