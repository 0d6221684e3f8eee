//! Repository configuration and credential storage.
//!
//! The config file is sectioned text: `[core]` or `[remote "origin"]`
//! headers followed by `key = value` lines. Comments start with `#` or `;`.
//! Credential files are line-oriented `remote=token` maps in the user's
//! home directory, written with mode 0600.

mod credentials;
mod parse;

pub use credentials::{CredentialProvider, CredentialsFile};
pub use parse::{parse_config, serialize_config, Section};

use std::path::{Path, PathBuf};

/// Errors from configuration handling.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A configured remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
    /// Auth token from the config itself, when present.
    pub token: Option<String>,
    /// Extra request headers from `header.<name> = value` entries.
    pub headers: Vec<(String, String)>,
}

/// Parsed repository configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    sections: Vec<Section>,
    path: Option<PathBuf>,
}

impl Config {
    /// Load from a config file. A missing file yields an empty config.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let sections = match std::fs::read_to_string(&path) {
            Ok(text) => parse_config(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            sections,
            path: Some(path),
        })
    }

    /// Serialize back to the file this config was loaded from.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| std::io::Error::other("config has no backing file"))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serialize_config(&self.sections))?;
        Ok(())
    }

    /// Look up a value in a plain section.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.get_in(section, None, key)
    }

    /// Look up a value in a subsectioned section, e.g. `[remote "origin"]`.
    pub fn get_in(&self, section: &str, subsection: Option<&str>, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == section && s.subsection.as_deref() == subsection)
            .and_then(|s| {
                s.entries
                    .iter()
                    .rev()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.as_str())
            })
    }

    /// Set a value, creating the section if needed.
    pub fn set(&mut self, section: &str, subsection: Option<&str>, key: &str, value: &str) {
        let existing = self
            .sections
            .iter_mut()
            .find(|s| s.name == section && s.subsection.as_deref() == subsection);
        let section = match existing {
            Some(s) => s,
            None => {
                self.sections.push(Section {
                    name: section.to_string(),
                    subsection: subsection.map(str::to_string),
                    entries: Vec::new(),
                });
                self.sections.last_mut().expect("just pushed")
            }
        };

        if let Some(entry) = section.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_string();
        } else {
            section.entries.push((key.to_string(), value.to_string()));
        }
    }

    /// The remote with the given name.
    pub fn remote(&self, name: &str) -> Result<Remote, ConfigError> {
        self.sections
            .iter()
            .find(|s| s.name == "remote" && s.subsection.as_deref() == Some(name))
            .map(|s| section_to_remote(name, s))
            .ok_or_else(|| ConfigError::RemoteNotFound(name.to_string()))
    }

    /// All configured remotes, in file order.
    pub fn remotes(&self) -> Vec<Remote> {
        self.sections
            .iter()
            .filter(|s| s.name == "remote")
            .filter_map(|s| {
                s.subsection
                    .as_deref()
                    .map(|name| section_to_remote(name, s))
            })
            .collect()
    }

    /// Add or replace a remote section.
    pub fn set_remote(&mut self, remote: &Remote) {
        self.set("remote", Some(&remote.name), "url", &remote.url);
        if let Some(token) = &remote.token {
            self.set("remote", Some(&remote.name), "token", token);
        }
        for (header, value) in &remote.headers {
            self.set("remote", Some(&remote.name), &format!("header.{header}"), value);
        }
    }
}

fn section_to_remote(name: &str, section: &Section) -> Remote {
    let mut url = String::new();
    let mut token = None;
    let mut headers = Vec::new();

    for (key, value) in &section.entries {
        if key == "url" {
            url = value.clone();
        } else if key == "token" {
            token = Some(value.clone());
        } else if let Some(header) = key.strip_prefix("header.") {
            headers.push((header.to_string(), value.clone()));
        }
    }

    Remote {
        name: name.to_string(),
        url,
        token,
        headers,
    }
}
