use std::fmt;

use crate::error::RefError;

/// A validated reference name, e.g. `refs/heads/main` or `HEAD`.
///
/// Names are slash-joined paths. Validation rejects the patterns that would
/// escape the refs directory or collide with the lock protocol:
/// - empty names and empty path segments (leading/trailing `/`, `//`)
/// - `.` or `..` segments
/// - ASCII control characters, space, and `~^:?*[\`
/// - a `.lock` suffix
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefName(String);

const FORBIDDEN_CHARS: &[u8] = b" ~^:?*[\\";

impl RefName {
    /// Create and validate a ref name.
    pub fn new(name: impl Into<String>) -> Result<Self, RefError> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// The full name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The short name: `main` from `refs/heads/main` or
    /// `origin/main` from `refs/remotes/origin/main`.
    pub fn short_name(&self) -> &str {
        self.0
            .strip_prefix("refs/heads/")
            .or_else(|| self.0.strip_prefix("refs/tags/"))
            .or_else(|| self.0.strip_prefix("refs/remotes/"))
            .unwrap_or(&self.0)
    }

    /// Is this under `refs/heads/`?
    pub fn is_branch(&self) -> bool {
        self.0.starts_with("refs/heads/")
    }

    /// Is this under `refs/remotes/`?
    pub fn is_remote_tracking(&self) -> bool {
        self.0.starts_with("refs/remotes/")
    }

    /// The branch ref for a short branch name.
    pub fn branch(name: &str) -> Result<Self, RefError> {
        Self::new(format!("refs/heads/{name}"))
    }

    /// The remote-tracking ref for a remote and branch.
    pub fn remote_tracking(remote: &str, branch: &str) -> Result<Self, RefError> {
        Self::new(format!("refs/remotes/{remote}/{branch}"))
    }
}

fn validate(name: &str) -> Result<(), RefError> {
    if name.is_empty() {
        return Err(RefError::InvalidName("empty name".into()));
    }
    if name.ends_with(".lock") {
        return Err(RefError::InvalidName(format!("'{name}' ends with .lock")));
    }
    for segment in name.split('/') {
        if segment.is_empty() {
            return Err(RefError::InvalidName(format!(
                "'{name}' contains an empty path segment"
            )));
        }
        if segment == "." || segment == ".." {
            return Err(RefError::InvalidName(format!(
                "'{name}' contains a relative path segment"
            )));
        }
    }
    for &b in name.as_bytes() {
        if b < 0x20 || b == 0x7f || FORBIDDEN_CHARS.contains(&b) {
            return Err(RefError::InvalidName(format!(
                "'{name}' contains forbidden byte 0x{b:02x}"
            )));
        }
    }
    Ok(())
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RefName {
    type Err = RefError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
