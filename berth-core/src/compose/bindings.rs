//! Config and secret file bindings.
//!
//! Services reference configs and secrets by name; the binding table maps
//! those names to the backing files declared in the top-level sections. The
//! table is built once per project load and passed down explicitly.

use super::types::{ComposeFile, FileObjectDefinition};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Name → file tables for configs and secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileBindings {
    configs: HashMap<String, String>,
    secrets: HashMap<String, String>,
}

impl FileBindings {
    /// Build the tables from a parsed compose file.
    ///
    /// Entries are reachable by their logical key and, when set, by their
    /// explicit `name`. External entries and entries without a file are skipped.
    pub fn from_compose(compose: &ComposeFile) -> Self {
        Self { configs: Self::table(&compose.configs), secrets: Self::table(&compose.secrets) }
    }

    fn table(defs: &IndexMap<String, FileObjectDefinition>) -> HashMap<String, String> {
        let mut table = HashMap::new();
        for (key, def) in defs {
            if def.external.is_external() {
                continue;
            }
            let Some(file) = &def.file else {
                continue;
            };
            table.insert(key.clone(), file.clone());
            if let Some(name) = &def.name {
                table.insert(name.clone(), file.clone());
            }
        }
        table
    }

    /// File backing config `name`.
    pub fn config(&self, name: &str) -> Option<&str> {
        self.configs.get(name).map(String::as_str)
    }

    /// File backing secret `name`.
    pub fn secret(&self, name: &str) -> Option<&str> {
        self.secrets.get(name).map(String::as_str)
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::types::External;

    #[test]
    fn test_bindings_by_key_and_name() {
        let mut compose = ComposeFile::default();
        compose.configs.insert(
            "nginx".to_string(),
            FileObjectDefinition {
                file: Some("./nginx.conf".to_string()),
                name: Some("nginx-v2".to_string()),
                ..Default::default()
            },
        );
        compose.secrets.insert(
            "token".to_string(),
            FileObjectDefinition { file: Some("token.txt".to_string()), ..Default::default() },
        );

        let bindings = FileBindings::from_compose(&compose);
        assert_eq!(bindings.config("nginx"), Some("./nginx.conf"));
        assert_eq!(bindings.config("nginx-v2"), Some("./nginx.conf"));
        assert_eq!(bindings.secret("token"), Some("token.txt"));
        assert_eq!(bindings.secret("nginx"), None);
    }

    #[test]
    fn test_external_entries_not_bound() {
        let mut compose = ComposeFile::default();
        compose.secrets.insert(
            "vault".to_string(),
            FileObjectDefinition {
                file: Some("vault.txt".to_string()),
                external: External::Flag(true),
                ..Default::default()
            },
        );
        assert_eq!(FileBindings::from_compose(&compose).secret("vault"), None);
    }

    #[test]
    fn test_tables_are_independent() {
        let mut first = FileBindings::default();
        first.configs.insert("app".to_string(), "a.conf".to_string());
        let second = FileBindings::default();
        assert_eq!(first.config("app"), Some("a.conf"));
        assert_eq!(second.config("app"), None);
    }
}
