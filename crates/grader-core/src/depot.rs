//! Depot identifiers and the depot list file.

use std::path::Path;

use serde::{Serialize, Serializer};
use tracing::warn;

use crate::error::ConfigError;

/// An `owner/name` pair naming one student depot.
///
/// A depot list line that fails validation is still carried as a
/// `DepotId` so the batch reports it; see [`DepotId::is_valid`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepotId {
    name: String,
    valid: bool,
}

impl DepotId {
    /// Parse and validate an identifier.
    ///
    /// Exactly one `/` separates two non-empty components made of ASCII
    /// alphanumerics, `-`, `_` and `.`; neither component may be `.` or `..`
    /// or start with `-`.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidDepot(input.to_string());

        let (owner, name) = input.split_once('/').ok_or_else(invalid)?;
        for part in [owner, name] {
            if !is_valid_component(part) {
                return Err(invalid());
            }
        }
        Ok(Self {
            name: input.to_string(),
            valid: true,
        })
    }

    /// Keep a depot list entry that failed [`DepotId::parse`].
    ///
    /// The pipeline reports it as a clone failure without running git.
    pub fn malformed(input: &str) -> Self {
        Self {
            name: input.to_string(),
            valid: false,
        }
    }

    /// Whether the identifier passed validation and may be cloned.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Directory name for the local clone: `owner/name` becomes `owner-name`.
    pub fn local_name(&self) -> String {
        self.name.replace('/', "-")
    }

    /// Remote URL under `base`, e.g. `ssh://git@github.com/owner/name.git`.
    pub fn remote_url(&self, base: &str) -> String {
        format!("{}/{}.git", base.trim_end_matches('/'), self.name)
    }
}

impl std::fmt::Display for DepotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for DepotId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl std::str::FromStr for DepotId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_valid_component(part: &str) -> bool {
    !part.is_empty()
        && part != "."
        && part != ".."
        && !part.starts_with('-')
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Parse depot list contents.
///
/// Lines starting with `#` and blank lines are skipped, trailing whitespace
/// is trimmed. Malformed identifiers are logged and kept in place as
/// [`DepotId::malformed`] so every listed depot gets a report line.
pub fn parse_depot_list(contents: &str) -> Vec<DepotId> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            if line.starts_with('#') {
                return None;
            }
            let line = line.trim_end();
            if line.is_empty() {
                return None;
            }
            match DepotId::parse(line) {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!(line = index + 1, error = %err, "Malformed depot list entry");
                    Some(DepotId::malformed(line))
                }
            }
        })
        .collect()
}

/// Read and parse the depot list at `path`.
pub fn read_depot_list(path: &Path) -> Result<Vec<DepotId>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::DepotList {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_depot_list(&contents))
}
