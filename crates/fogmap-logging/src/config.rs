//! Logging configuration
//!
//! Every section has a default, so a TOML `[logging]` table only names
//! what it changes:
//!
//! ```toml
//! default_level = "debug"
//!
//! [console]
//! format = "pretty"
//!
//! [targets]
//! fogmap_discovery = "trace"
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where fogmap logs go and how much of it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for every target without an override; `RUST_LOG` replaces it
    pub default_level: String,
    pub console: ConsoleConfig,
    /// Rolling log files, off unless set
    pub file: Option<FileConfig>,
    /// Fields included in JSON output (console or file)
    pub json: JsonConfig,
    /// Per-target levels, e.g. `fogmap_storage = "debug"`
    pub targets: BTreeMap<String, String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: None,
            json: JsonConfig::default(),
            targets: BTreeMap::new(),
        }
    }
}

impl LogConfig {
    /// Colored single-line console output with tile store detail
    pub fn development() -> Self {
        Self {
            default_level: "debug".to_string(),
            console: ConsoleConfig {
                enabled: true,
                format: ConsoleFormat::Compact,
                ansi: true,
            },
            ..Default::default()
        }
        .with_target("fogmap_discovery::store", "trace")
    }

    /// Daily JSON files under `log_dir`, nothing on the console
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            console: ConsoleConfig {
                enabled: false,
                ..ConsoleConfig::default()
            },
            file: Some(FileConfig {
                directory: log_dir,
                ..FileConfig::default()
            }),
            ..Default::default()
        }
    }

    /// Warnings only, uncolored
    pub fn testing() -> Self {
        Self {
            default_level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                format: ConsoleFormat::Compact,
                ansi: false,
            },
            ..Default::default()
        }
    }

    /// Override the level for one target
    pub fn with_target(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.targets.insert(target.into(), level.into());
        self
    }

    /// This config as a `RUST_LOG` style directive string
    pub fn filter_directives(&self) -> String {
        let mut directives = vec![self.default_level.clone()];
        directives.extend(
            self.targets
                .iter()
                .map(|(target, level)| format!("{target}={level}")),
        );
        directives.join(",")
    }
}

/// Console line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// Multi-line, human oriented
    Pretty,
    /// One line per event
    Compact,
    /// One JSON object per line
    #[default]
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: ConsoleFormat,
    /// Color escapes; ignored for JSON
    pub ansi: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: ConsoleFormat::Json,
            ansi: false,
        }
    }
}

/// Rolling JSON log files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name stem; rotated files get a date suffix
    pub prefix: String,
    pub rotation: RotationStrategy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "fogmap".to_string(),
            rotation: RotationStrategy::Daily,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// A single `<prefix>.log`, truncated on start
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonConfig {
    /// Event fields at the top level instead of under `fields`
    pub flatten_events: bool,
    /// Enclosing spans, e.g. `discovery_activate`
    pub span_list: bool,
    /// Source file and line
    pub source_location: bool,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            span_list: true,
            source_location: false,
        }
    }
}
