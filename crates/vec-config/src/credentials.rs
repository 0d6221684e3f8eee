use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::ConfigError;

/// A line-oriented `remote=token` credential file.
///
/// Lines starting with `#` are comments. The file is rewritten whole on
/// every store and created with mode 0600.
pub struct CredentialsFile {
    path: PathBuf,
}

impl CredentialsFile {
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The token recorded for a remote, if any.
    pub fn token(&self, remote: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.load()?.remove(remote))
    }

    /// Record (or replace) a remote's token.
    pub fn store(&self, remote: &str, token: &str) -> Result<(), ConfigError> {
        let mut entries = self.load()?;
        entries.insert(remote.to_string(), token.to_string());

        let mut names: Vec<&String> = entries.keys().collect();
        names.sort();
        let mut text = String::new();
        for name in names {
            text.push_str(&format!("{name}={}\n", entries[name]));
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, text)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Remove a remote's token.
    pub fn forget(&self, remote: &str) -> Result<(), ConfigError> {
        let mut entries = self.load()?;
        if entries.remove(remote).is_some() {
            let mut names: Vec<&String> = entries.keys().collect();
            names.sort();
            let mut text = String::new();
            for name in names {
                text.push_str(&format!("{name}={}\n", entries[name]));
            }
            std::fs::write(&self.path, text)?;
        }
        Ok(())
    }

    fn load(&self) -> Result<HashMap<String, String>, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((remote, token)) = line.split_once('=') {
                entries.insert(remote.trim().to_string(), token.trim().to_string());
            }
        }
        Ok(entries)
    }
}

/// The single lookup point for remote authentication.
///
/// Token source order: the remote's in-config token first, then the
/// on-disk credentials file. Refresh tokens only ever live on disk.
pub struct CredentialProvider {
    credentials: CredentialsFile,
    refresh_tokens: CredentialsFile,
}

impl CredentialProvider {
    /// Provider over explicit file paths.
    pub fn at(credentials: impl AsRef<Path>, refresh_tokens: impl AsRef<Path>) -> Self {
        Self {
            credentials: CredentialsFile::at(credentials),
            refresh_tokens: CredentialsFile::at(refresh_tokens),
        }
    }

    /// Provider over `<home>/.vec/credentials` and `<home>/.vec/refresh_tokens`.
    pub fn for_home(home: impl AsRef<Path>) -> Self {
        let dir = home.as_ref().join(".vec");
        Self::at(dir.join("credentials"), dir.join("refresh_tokens"))
    }

    /// Provider over the current user's home directory.
    pub fn default_locations() -> Option<Self> {
        std::env::var_os("HOME").map(|home| Self::for_home(PathBuf::from(home)))
    }

    /// The auth token for a remote: config token first, then disk.
    pub fn token(
        &self,
        remote: &str,
        config_token: Option<&str>,
    ) -> Result<Option<String>, ConfigError> {
        if let Some(token) = config_token {
            return Ok(Some(token.to_string()));
        }
        self.credentials.token(remote)
    }

    /// The refresh token for a remote.
    pub fn refresh_token(&self, remote: &str) -> Result<Option<String>, ConfigError> {
        self.refresh_tokens.token(remote)
    }

    /// Persist both tokens after a successful login or refresh.
    pub fn store_tokens(
        &self,
        remote: &str,
        token: &str,
        refresh_token: &str,
    ) -> Result<(), ConfigError> {
        self.credentials.store(remote, token)?;
        self.refresh_tokens.store(remote, refresh_token)
    }
}
