//! Configuration loading for serra
//!
//! Loads the YAML configuration document describing engine settings, sites
//! with their sensors and equipment, automation rules, and notification
//! preferences. Also ships [`demo`], the built-in dataset used when no file
//! is given.
//!
//! # Example
//!
//! ```ignore
//! let config = serra_config::load("serra.yaml")?;
//! let sites = config.build_sites()?;
//! ```

mod demo;
mod error;
mod model;

pub use demo::demo;
pub use error::{ConfigError, ConfigResult};
pub use model::{EngineSettings, EquipmentConfig, SensorConfig, SerraConfig, SiteConfig};

use std::fs;
use std::path::Path;
use tracing::debug;

/// Load and parse a configuration file
pub fn load(path: impl AsRef<Path>) -> ConfigResult<SerraConfig> {
    let path = path.as_ref();
    debug!(?path, "Loading configuration");

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(&content, path)
}

/// Parse a configuration document from a string
pub fn load_str(content: &str) -> ConfigResult<SerraConfig> {
    parse(content, Path::new("<inline>"))
}

fn parse(content: &str, path: &Path) -> ConfigResult<SerraConfig> {
    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
        path: path.to_path_buf(),
        source: e,
    })
}
