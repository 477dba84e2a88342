// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! INI-style configuration loading.
//!
//! The file has two sections. `[Settings]` carries scalar options;
//! `[Patterns]` carries one rule per line in either the three-field form
//! `Name=<folder>|<regex>|<command>` or the two-field form
//! `Name=<regex>|<command>` (which watches `DefaultMonitoredFolder`).
//!
//! Rules whose regex fails to compile are logged and skipped; the load as a
//! whole fails only when no valid rule remains. Configuration is applied once
//! at service start; there is no runtime reload.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::pattern::{PatternRule, Registry};

/// Default metrics endpoint port.
pub const DEFAULT_WEB_PORT: u16 = 8080;

/// Scalar options from the `[Settings]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Folder watched by two-field rules.
    pub default_monitored_folder: PathBuf,
    /// Primary log file.
    pub log_file: PathBuf,
    /// Detailed (debug-level) log file, active when `detailed_logging` is on.
    pub detailed_log_file: PathBuf,
    /// Backing file for the processed-files ledger.
    pub processed_files_db: PathBuf,
    pub detailed_logging: bool,
    pub web_server_port: u16,
    pub web_server_enabled: bool,
}

impl Settings {
    /// Defaults rooted under `state_dir` (mirrors the layout the service
    /// creates on first start).
    pub fn default_under(state_dir: &Path) -> Self {
        Self {
            default_monitored_folder: state_dir.join("monitored"),
            log_file: state_dir.join("ptc.log"),
            detailed_log_file: state_dir.join("ptc_detailed.log"),
            processed_files_db: state_dir.join("ptc_processed.txt"),
            detailed_logging: true,
            web_server_port: DEFAULT_WEB_PORT,
            web_server_enabled: true,
        }
    }

    /// Render the `[Settings]` section.
    ///
    /// Byte-stable: loading a rendered section and rendering it again yields
    /// the same text. Both the first-start config writer and `ptc config`
    /// go through here.
    pub fn render(&self) -> String {
        format!(
            "[Settings]\n\
             DefaultMonitoredFolder={}\n\
             LogFile={}\n\
             DetailedLogFile={}\n\
             ProcessedFilesDB={}\n\
             DetailedLogging={}\n\
             WebServerPort={}\n\
             WebServerEnabled={}\n",
            self.default_monitored_folder.display(),
            self.log_file.display(),
            self.detailed_log_file.display(),
            self.processed_files_db.display(),
            self.detailed_logging,
            self.web_server_port,
            self.web_server_enabled,
        )
    }
}

/// A `[Patterns]` rule that failed validation, kept for `ptc config` output.
#[derive(Debug, Clone)]
pub struct RejectedRule {
    pub name: String,
    pub folder: String,
    pub regex: String,
    pub error: String,
}

/// Result of a successful configuration load.
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub registry: Registry,
    pub rejected: Vec<RejectedRule>,
}

/// Configuration errors. Only these are fatal; per-rule problems are not.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no valid pattern rule in {path}")]
    NoValidRules { path: PathBuf },
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Load a configuration file, writing one with defaults and examples
    /// first if it does not exist.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let settings = Settings::default_under(&state_dir());
            write_default(path, &settings)?;
            info!(path = %path.display(), "wrote default configuration");
        }
        Self::load(path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut settings = Settings::default_under(&state_dir());
        let mut rules: Vec<PatternRule> = Vec::new();
        let mut rejected: Vec<RejectedRule> = Vec::new();
        let mut section = Section::None;

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = match name.trim() {
                    "Settings" => Section::Settings,
                    "Patterns" => Section::Patterns,
                    other => {
                        warn!(section = other, "ignoring unknown config section");
                        Section::None
                    }
                };
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                warn!(line = raw_line, "ignoring config line without '='");
                continue;
            };
            let key = key.trim();
            // A '#' terminates an inline value.
            let value = value.split('#').next().unwrap_or("").trim();

            match section {
                Section::Settings => apply_setting(&mut settings, key, value),
                Section::Patterns => {
                    match parse_rule(key, value, &settings.default_monitored_folder) {
                        Ok(rule) => rules.push(rule),
                        Err(reject) => {
                            warn!(
                                rule = %reject.name,
                                regex = %reject.regex,
                                error = %reject.error,
                                "skipping invalid pattern rule"
                            );
                            rejected.push(reject);
                        }
                    }
                }
                Section::None => {}
            }
        }

        if rules.is_empty() {
            return Err(ConfigError::NoValidRules {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            settings,
            registry: Registry::new(rules),
            rejected,
        })
    }
}

#[derive(Clone, Copy)]
enum Section {
    None,
    Settings,
    Patterns,
}

fn apply_setting(settings: &mut Settings, key: &str, value: &str) {
    match key {
        "DefaultMonitoredFolder" => settings.default_monitored_folder = PathBuf::from(value),
        "LogFile" => settings.log_file = PathBuf::from(value),
        "DetailedLogFile" => settings.detailed_log_file = PathBuf::from(value),
        "ProcessedFilesDB" => settings.processed_files_db = PathBuf::from(value),
        "DetailedLogging" => match parse_bool(value) {
            Some(b) => settings.detailed_logging = b,
            None => warn!(value, "invalid DetailedLogging value, keeping default"),
        },
        "WebServerPort" => match value.parse::<u16>() {
            Ok(port) => settings.web_server_port = port,
            Err(_) => warn!(value, "invalid WebServerPort value, keeping default"),
        },
        "WebServerEnabled" => match parse_bool(value) {
            Some(b) => settings.web_server_enabled = b,
            None => warn!(value, "invalid WebServerEnabled value, keeping default"),
        },
        other => warn!(key = other, "ignoring unknown setting"),
    }
}

/// Accepted boolean spellings: true/false, 1/0, yes/no (case-insensitive).
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_rule(name: &str, value: &str, default_folder: &Path) -> Result<PatternRule, RejectedRule> {
    let fields: Vec<&str> = value.split('|').map(str::trim).collect();
    let (folder, regex, command) = match fields.as_slice() {
        [folder, regex, command] => (folder.to_string(), *regex, *command),
        [regex, command] => (default_folder.display().to_string(), *regex, *command),
        _ => {
            return Err(RejectedRule {
                name: name.to_string(),
                folder: String::new(),
                regex: value.to_string(),
                error: format!("expected 2 or 3 '|'-separated fields, got {}", fields.len()),
            })
        }
    };

    PatternRule::compile(name, &folder, regex, command).map_err(|e| RejectedRule {
        name: name.to_string(),
        folder,
        regex: regex.to_string(),
        error: e.to_string(),
    })
}

fn write_default(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, default_file_contents(settings)).map_err(io_err)
}

/// Full contents of a freshly generated configuration file.
pub fn default_file_contents(settings: &Settings) -> String {
    format!(
        "# PatternTriggerCommand configuration\n\
         #\n\
         # Lines beginning with '#' or ';' are comments. A '#' also ends a value.\n\
         #\n\
         {}\n\
         [Patterns]\n\
         # Three-field form: Name=<folder>|<regex>|<command>\n\
         # Two-field form:   Name=<regex>|<command>   (watches DefaultMonitoredFolder)\n\
         #\n\
         # Reports=^report_.*\\.csv$|/usr/local/bin/handle-report\n\
         #\n\
         # The starter rule below watches DefaultMonitoredFolder; replace it\n\
         # with real rules.\n\
         ExampleTxt=^.*\\.txt$|/bin/true\n",
        settings.render(),
    )
}

/// State directory for logs, the ledger, and the PID lock.
///
/// `PTC_STATE_DIR` takes priority (used by tests for isolation), then
/// `$XDG_STATE_HOME/ptc`, then `~/.local/state/ptc`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PTC_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("ptc");
    }
    match dirs::home_dir() {
        Some(home) => home.join(".local/state/ptc"),
        None => PathBuf::from("."),
    }
}

/// Default configuration file location.
///
/// `PTC_CONFIG` takes priority, then `~/.config/ptc/config.ini`, falling
/// back to `config.ini` under the state directory.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("PTC_CONFIG") {
        return PathBuf::from(path);
    }
    match dirs::config_dir() {
        Some(dir) => dir.join("ptc").join("config.ini"),
        None => state_dir().join("config.ini"),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
