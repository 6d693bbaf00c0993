//! CLI configuration – reads/writes `~/.transport/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use transport_challenge::TransportConfig;

/// Persisted configuration of the `transport` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket URL of the simulator.  Empty runs the in-process world.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub simulator_url: String,

    /// Catalog TOML to use instead of the built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<String>,

    /// Scene layout JSON.  When set, the scene is populated from it;
    /// otherwise the fixed demo scene is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_path: Option<String>,

    /// Room of the layout the objects must be delivered to.
    #[serde(default)]
    pub goal_room: i32,

    /// How many target objects the demo tries to load into the container.
    #[serde(default = "default_objects_to_collect")]
    pub objects_to_collect: usize,

    /// Attempts at picking up the container before giving up.
    #[serde(default = "default_max_container_attempts")]
    pub max_container_attempts: u32,

    #[serde(default)]
    pub transport: TransportConfig,
}

fn default_objects_to_collect() -> usize {
    3
}
fn default_max_container_attempts() -> u32 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulator_url: String::new(),
            catalog_path: None,
            layout_path: None,
            goal_room: 0,
            objects_to_collect: default_objects_to_collect(),
            max_container_attempts: default_max_container_attempts(),
            transport: TransportConfig::default(),
        }
    }
}

/// Return the path to `~/.transport/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".transport").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    cfg.transport.validate().map_err(|e| e.to_string())?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `TRANSPORT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TRANSPORT_SIMULATOR_URL` | `simulator_url` |
/// | `TRANSPORT_CATALOG` | `catalog_path` |
/// | `TRANSPORT_LAYOUT` | `layout_path` |
/// | `TRANSPORT_SEED` | `transport.random_seed` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TRANSPORT_SIMULATOR_URL") {
        cfg.simulator_url = v;
    }
    if let Ok(v) = std::env::var("TRANSPORT_CATALOG") {
        cfg.catalog_path = Some(v);
    }
    if let Ok(v) = std::env::var("TRANSPORT_LAYOUT") {
        cfg.layout_path = Some(v);
    }
    if let Ok(v) = std::env::var("TRANSPORT_SEED")
        && let Ok(seed) = v.parse::<u64>()
    {
        cfg.transport.random_seed = Some(seed);
    }
}

/// Save the config to disk, creating `~/.transport/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
