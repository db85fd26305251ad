//! Configuration resolution.
//!
//! The only setting the core needs is where the ticket directory lives.
//! Resolution order: the `--ticket-dir` flag, an explicit `-c` config file
//! (an error if missing), `.tick.yaml` in the resolved working directory,
//! the XDG global config, then the `.tickets` default. Configuration is
//! loaded once and passed by value; there is no global mutable state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TickError};

pub const DEFAULT_TICKET_DIR: &str = ".tickets";
pub const LOCAL_CONFIG_FILE: &str = ".tick.yaml";

/// On-disk config file shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_dir: Option<PathBuf>,
}

/// Where the resolved ticket directory came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Flag,
    File(PathBuf),
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Flag => f.write_str("--ticket-dir flag"),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Default => f.write_str("default"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cwd: PathBuf,
    pub ticket_dir: PathBuf,
    pub source: ConfigSource,
}

impl Config {
    /// Resolve configuration from the global CLI flags.
    pub fn resolve(
        cwd_flag: Option<&Path>,
        config_flag: Option<&Path>,
        ticket_dir_flag: Option<&Path>,
    ) -> Result<Config> {
        let cwd = resolve_cwd(cwd_flag)?;

        if let Some(dir) = ticket_dir_flag {
            return Ok(Config {
                ticket_dir: absolutize(&cwd, dir),
                cwd,
                source: ConfigSource::Flag,
            });
        }

        if let Some(path) = config_flag {
            let path = absolutize(&cwd, path);
            if !path.is_file() {
                return Err(TickError::ConfigNotFound(path));
            }
            let file = load_file(&path)?;
            return Ok(Config {
                ticket_dir: ticket_dir_from(&cwd, &file),
                cwd,
                source: ConfigSource::File(path),
            });
        }

        let local = cwd.join(LOCAL_CONFIG_FILE);
        if local.is_file() {
            let file = load_file(&local)?;
            return Ok(Config {
                ticket_dir: ticket_dir_from(&cwd, &file),
                cwd,
                source: ConfigSource::File(local),
            });
        }

        if let Some(global) = global_config_path()
            && global.is_file()
        {
            let file = load_file(&global)?;
            return Ok(Config {
                ticket_dir: ticket_dir_from(&cwd, &file),
                cwd,
                source: ConfigSource::File(global),
            });
        }

        Ok(Config {
            ticket_dir: cwd.join(DEFAULT_TICKET_DIR),
            cwd,
            source: ConfigSource::Default,
        })
    }

    /// `print-config` output.
    pub fn render(&self) -> String {
        format!(
            "cwd: {}\nticket_dir: {}\nsource: {}",
            self.cwd.display(),
            self.ticket_dir.display(),
            self.source
        )
    }
}

fn resolve_cwd(cwd_flag: Option<&Path>) -> Result<PathBuf> {
    let current = std::env::current_dir()
        .map_err(|e| TickError::Config(format!("cannot resolve working directory: {e}")))?;
    match cwd_flag {
        Some(dir) => {
            let dir = absolutize(&current, dir);
            if !dir.is_dir() {
                return Err(TickError::Config(format!(
                    "working directory '{}' does not exist",
                    dir.display()
                )));
            }
            Ok(dir)
        }
        None => Ok(current),
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn ticket_dir_from(cwd: &Path, file: &ConfigFile) -> PathBuf {
    match &file.ticket_dir {
        Some(dir) => absolutize(cwd, dir),
        None => cwd.join(DEFAULT_TICKET_DIR),
    }
}

fn load_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| TickError::Config(format!("cannot read '{}': {e}", path.display())))?;
    Ok(serde_yaml_ng::from_str(&content)?)
}

/// `$XDG_CONFIG_HOME/tick/config.yaml` (or the platform equivalent).
fn global_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("tick").join("config.yaml"))
}
