//! Test harness fingerprinting.
//!
//! The harness is the tail of the submitted source file, from the marker line
//! to end of file. Its SHA-256 digest is compared against the digest of the
//! unmodified harness to detect tampering.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Result, StageError};

/// Line that opens the protected harness.
pub const HARNESS_MARKER: &str = "int main()";

/// Digest of the unmodified harness.
pub const REFERENCE_DIGEST: &str =
    "a6451d4224897bf44fb4618386fa30ce95adbc1f1ee7196cdb7e8d41dd592628";

/// SHA-256 of zero bytes; what a file without the marker line hashes to.
pub const EMPTY_DIGEST: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Hex digest of a harness section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HarnessDigest(String);

impl HarnessDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact comparison against a reference digest.
    pub fn matches(&self, reference: &str) -> bool {
        self.0 == reference
    }

    /// Whether no marker line was found (nothing was hashed).
    pub fn is_empty_input(&self) -> bool {
        self.0 == EMPTY_DIGEST
    }
}

impl std::fmt::Display for HarnessDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash every line of `path` from the first line equal to `marker` to EOF.
pub fn hash_test_code(path: &Path, marker: &str) -> Result<HarnessDigest> {
    let harness_err = |source| StageError::Harness {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(harness_err)?;
    hash_reader(BufReader::new(file), marker).map_err(harness_err)
}

/// Same as [`hash_test_code`] over any buffered reader.
///
/// Line endings are read the way text-mode readers do: CRLF and a lone CR
/// both end a line and are hashed as LF. The marker must be a complete line,
/// so a marker on an unterminated last line starts nothing.
pub fn hash_reader<R: BufRead>(mut reader: R, marker: &str) -> io::Result<HarnessDigest> {
    let mut hasher = Sha256::new();
    let mut in_harness = false;
    let mut chunk = Vec::new();

    loop {
        chunk.clear();
        if reader.read_until(b'\n', &mut chunk)? == 0 {
            break;
        }
        if chunk.ends_with(b"\r\n") {
            chunk.truncate(chunk.len() - 2);
            chunk.push(b'\n');
        }

        for piece in chunk.split_inclusive(|&b| b == b'\r') {
            let (content, terminated) = split_terminator(piece);
            if !in_harness && terminated && content == marker.as_bytes() {
                in_harness = true;
            }
            if in_harness {
                hasher.update(content);
                if terminated {
                    hasher.update(b"\n");
                }
            }
        }
    }

    Ok(HarnessDigest(hex::encode(hasher.finalize())))
}

/// Line content and whether a terminator followed it.
fn split_terminator(line: &[u8]) -> (&[u8], bool) {
    match line.strip_suffix(b"\r").or_else(|| line.strip_suffix(b"\n")) {
        Some(content) => (content, true),
        None => (line, false),
    }
}
