//! Configuration fingerprints.
//!
//! A fingerprint is the SHA-256 digest of a service's canonical JSON
//! serialization. It is stored on every container under
//! [`LABEL_CONFIG_HASH`] and compared by exact string equality.

use crate::compose::Service;
use crate::error::{BerthError, Result};
use crate::types::labels::LABEL_CONFIG_HASH;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Hex digest of a service record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

#[derive(Serialize)]
struct Canonical<'a> {
    name: &'a str,
    service: &'a Service,
}

impl Fingerprint {
    /// Fingerprint of service `name` with record `service`.
    ///
    /// Every map in [`Service`] is ordered, so identical records serialize to
    /// identical bytes in any process.
    pub fn of(name: &str, service: &Service) -> Result<Self> {
        let canonical = serde_json::to_vec(&Canonical { name, service }).map_err(|e| {
            BerthError::translation(name, format!("cannot serialize service record: {}", e))
        })?;
        let digest = Sha256::digest(&canonical);
        Ok(Self(format!("{:x}", digest)))
    }

    /// Fingerprint recorded on a container, if any.
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Option<Self> {
        labels.get(LABEL_CONFIG_HASH).map(|v| Self(v.clone()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{KeyValues, Scalar};

    fn service() -> Service {
        Service {
            image: "nginx:1.25".to_string(),
            environment: KeyValues::Map(BTreeMap::from([
                ("B".to_string(), Some(Scalar::String("2".to_string()))),
                ("A".to_string(), Some(Scalar::String("1".to_string()))),
            ])),
            ..Default::default()
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = Fingerprint::of("web", &service()).unwrap();
        let b = Fingerprint::of("web", &service()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_fingerprint_covers_name_and_record() {
        let base = Fingerprint::of("web", &service()).unwrap();
        assert_ne!(base, Fingerprint::of("api", &service()).unwrap());

        let mut changed = service();
        changed.image = "nginx:1.26".to_string();
        assert_ne!(base, Fingerprint::of("web", &changed).unwrap());
    }

    #[test]
    fn test_from_labels() {
        let fp = Fingerprint::of("web", &service()).unwrap();
        let labels = BTreeMap::from([(LABEL_CONFIG_HASH.to_string(), fp.to_string())]);
        assert_eq!(Fingerprint::from_labels(&labels), Some(fp));
        assert_eq!(Fingerprint::from_labels(&BTreeMap::new()), None);
    }
}
