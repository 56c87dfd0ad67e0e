//! Compose file parser.
//!
//! Parses compose files and validates them.

use super::types::*;
use crate::error::{BerthError, Result};
use indexmap::IndexMap;
use std::path::Path;
use tracing::{info, instrument};

/// Parser for compose files.
pub struct ComposeParser;

impl ComposeParser {
    /// Parse a compose file from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The YAML is invalid
    /// - The compose version is unsupported
    /// - No services are declared, or a service has no image
    #[instrument(skip(content))]
    pub fn parse(content: &str) -> Result<ComposeFile> {
        info!("Parsing compose file");

        let compose: ComposeFile = serde_yaml::from_str(content)
            .map_err(|e| BerthError::ComposeParseError { reason: e.to_string() })?;

        Self::validate_version(&compose.version)?;
        Self::validate_services(&compose.services)?;

        Ok(compose)
    }

    /// Parse a compose file from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its content is invalid (see `parse`).
    #[instrument]
    pub fn parse_file<P: AsRef<Path> + std::fmt::Debug>(path: P) -> Result<ComposeFile> {
        let path = path.as_ref();
        info!("Reading compose file from {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| BerthError::FileReadError {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Validate that the compose version is supported.
    ///
    /// Supports compose file format versions 2 and 3, and the versionless format.
    fn validate_version(version: &str) -> Result<()> {
        if version.is_empty() || version.starts_with('2') || version.starts_with('3') {
            Ok(())
        } else {
            Err(BerthError::UnsupportedComposeVersion { version: version.to_string() })
        }
    }

    /// Validate that services are properly defined.
    fn validate_services(services: &IndexMap<String, Service>) -> Result<()> {
        if services.is_empty() {
            return Err(BerthError::ComposeParseError {
                reason: "No services defined".to_string(),
            });
        }

        for (name, service) in services {
            if service.image.is_empty() {
                return Err(BerthError::ComposeParseError {
                    reason: format!("Service '{}' missing image", name),
                });
            }
        }

        Ok(())
    }
}
