//! Ingest limits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource limits applied while reading a source.
///
/// Archives beyond these limits are rejected as
/// [`IngestError::CorruptArchive`](cadastre_core::IngestError::CorruptArchive)
/// before any entry is decompressed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Most entries an archive may list. Default: 10 000.
    pub max_archive_entries: usize,
    /// Most bytes an archive may decompress to, summed over the entries
    /// actually read. Default: 2 GiB.
    pub max_uncompressed_bytes: u64,
    /// How many archive levels are opened; `1` means only the outer
    /// archive. Default: 2.
    pub max_archive_depth: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_archive_entries: 10_000,
            max_uncompressed_bytes: 2 << 30,
            max_archive_depth: 2,
        }
    }
}

impl IngestConfig {
    /// Check that every limit is non-zero.
    pub fn validate(&self) -> Result<(), IngestConfigError> {
        if self.max_archive_entries == 0 {
            return Err(IngestConfigError::ZeroLimit {
                field: "max_archive_entries",
            });
        }
        if self.max_uncompressed_bytes == 0 {
            return Err(IngestConfigError::ZeroLimit {
                field: "max_uncompressed_bytes",
            });
        }
        if self.max_archive_depth == 0 {
            return Err(IngestConfigError::ZeroLimit {
                field: "max_archive_depth",
            });
        }
        Ok(())
    }
}

/// Errors detected by [`IngestConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestConfigError {
    /// A limit was set to zero, which would reject every input.
    ZeroLimit {
        /// The offending field.
        field: &'static str,
    },
}

impl fmt::Display for IngestConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroLimit { field } => write!(f, "{field} must be at least 1"),
        }
    }
}

impl std::error::Error for IngestConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(IngestConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_depth_is_rejected() {
        let cfg = IngestConfig {
            max_archive_depth: 0,
            ..IngestConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(IngestConfigError::ZeroLimit {
                field: "max_archive_depth"
            })
        );
    }
}
