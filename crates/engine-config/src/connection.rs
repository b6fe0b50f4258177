use crate::error::SettingsError;
use std::path::PathBuf;

pub const SOURCE_PATH_VAR: &str = "LIBMIGRATE_SOURCE_PATH";
pub const TARGET_URL_VAR: &str = "LIBMIGRATE_TARGET_URL";
pub const JOURNAL_PATH_VAR: &str = "LIBMIGRATE_JOURNAL_PATH";

/// Where to read from, where to write to and where to journal runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub source_path: Option<PathBuf>,
    pub target_url: Option<String>,
    pub journal_path: Option<PathBuf>,
}

impl ConnectionSettings {
    /// Reads the `LIBMIGRATE_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            source_path: non_empty(SOURCE_PATH_VAR).map(PathBuf::from),
            target_url: non_empty(TARGET_URL_VAR),
            journal_path: non_empty(JOURNAL_PATH_VAR).map(PathBuf::from),
        }
    }

    /// Layers `overrides` on top of `self`; set fields of `overrides` win.
    pub fn merge(self, overrides: ConnectionSettings) -> Self {
        Self {
            source_path: overrides.source_path.or(self.source_path),
            target_url: overrides.target_url.or(self.target_url),
            journal_path: overrides.journal_path.or(self.journal_path),
        }
    }

    pub fn require_source(&self) -> Result<&PathBuf, SettingsError> {
        self.source_path
            .as_ref()
            .ok_or(SettingsError::MissingConnection(SOURCE_PATH_VAR))
    }

    pub fn require_target(&self) -> Result<&str, SettingsError> {
        self.target_url
            .as_deref()
            .ok_or(SettingsError::MissingConnection(TARGET_URL_VAR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn reads_variables_and_ignores_blank_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (SOURCE_PATH_VAR, "/data/library"),
            (TARGET_URL_VAR, "   "),
        ]);
        let settings = ConnectionSettings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(settings.source_path, Some(PathBuf::from("/data/library")));
        assert_eq!(settings.target_url, None);
        assert!(matches!(
            settings.require_target(),
            Err(SettingsError::MissingConnection(TARGET_URL_VAR))
        ));
    }

    #[test]
    fn flags_override_environment() {
        let env = ConnectionSettings {
            source_path: Some("/env/source".into()),
            target_url: Some("postgres://env".into()),
            journal_path: None,
        };
        let flags = ConnectionSettings {
            target_url: Some("postgres://flag".into()),
            ..Default::default()
        };

        let merged = env.merge(flags);
        assert_eq!(merged.require_target().unwrap(), "postgres://flag");
        assert_eq!(merged.require_source().unwrap(), &PathBuf::from("/env/source"));
    }
}
