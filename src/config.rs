use eyre::{Context, Result};
use eztools_worker::dispatch::{CollisionPolicy, DEFAULT_PREVIEW_BYTES, DispatcherOptions};
use eztools_worker::tools::{ToolOverride, ToolRegistry};
use eztools_worker::worker::DEFAULT_CONCURRENCY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dispatch: DispatchConfig,
    pub worker: WorkerConfig,
    /// TOML tool catalog replacing the built-in descriptors
    pub catalog: Option<PathBuf>,
    /// Per-tool install location overrides, keyed by tool id
    pub tools: BTreeMap<String, ToolOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub output_dir: PathBuf,
    pub scratch_dir: Option<PathBuf>,
    pub collision: CollisionPolicy,
    /// Zero disables the timeout
    pub timeout_ms: u64,
    pub preview_bytes: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("eztools-output"),
            scratch_dir: None,
            collision: CollisionPolicy::default(),
            timeout_ms: 0,
            preview_bytes: DEFAULT_PREVIEW_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Build the tool registry: catalog or built-ins, then overrides
    pub fn registry(&self) -> Result<ToolRegistry> {
        let mut registry = match &self.catalog {
            Some(path) => ToolRegistry::from_file(path)
                .with_context(|| format!("Failed to load tool catalog {}", path.display()))?,
            None => ToolRegistry::builtin(),
        };
        for (id, tool_override) in &self.tools {
            registry
                .apply_override(id, tool_override)
                .with_context(|| format!("Invalid override for tool '{}'", id))?;
        }
        Ok(registry)
    }

    /// Dispatcher options from the `dispatch` section
    pub fn dispatcher_options(&self) -> DispatcherOptions {
        let dispatch = &self.dispatch;
        DispatcherOptions {
            scratch_dir: dispatch.scratch_dir.clone(),
            collision: dispatch.collision,
            timeout: (dispatch.timeout_ms > 0).then(|| Duration::from_millis(dispatch.timeout_ms)),
            preview_bytes: dispatch.preview_bytes,
        }
    }
}
