use crate::{
    error::SettingsError,
    settings::{DEFAULT_CHUNK_SIZE, MigrationSettings, validated::ValidatedSettings},
};
use tracing::{info, warn};

const LARGE_CHUNK_WARNING: usize = 100_000;

/// Checks raw settings and fills in defaults.
pub struct SettingsValidator;

impl SettingsValidator {
    pub fn validate(settings: &MigrationSettings) -> Result<ValidatedSettings, SettingsError> {
        let mut errors: Vec<String> = Vec::new();

        let chunk_size = settings.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            errors.push("chunk_size must be greater than zero".to_string());
        } else if chunk_size > LARGE_CHUNK_WARNING {
            warn!(
                "Chunk size {} is very large, may cause memory issues",
                chunk_size
            );
        }

        // Pages default to the chunk size so one fetch feeds one transaction.
        let page_size = settings.page_size.unwrap_or(chunk_size);
        if page_size == 0 {
            errors.push("page_size must be greater than zero".to_string());
        }

        if !errors.is_empty() {
            return Err(SettingsError::ValidationFailed(errors));
        }

        let validated = ValidatedSettings {
            chunk_size,
            page_size,
            resolution: settings.resolution.unwrap_or_default(),
            prewarm_cache: settings.prewarm_cache.unwrap_or(false),
        };

        info!(settings = %validated.describe(), "Settings validated");
        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ResolutionMode;
    use tracing_test::traced_test;

    #[test]
    fn defaults_follow_chunk_size() {
        let validated =
            SettingsValidator::validate(&MigrationSettings::default().with_chunk_size(25)).unwrap();
        assert_eq!(validated.chunk_size, 25);
        assert_eq!(validated.page_size, 25);
        assert_eq!(validated.resolution, ResolutionMode::Strict);
        assert!(!validated.prewarm_cache);

        assert_eq!(
            SettingsValidator::validate(&MigrationSettings::default()).unwrap(),
            ValidatedSettings::default()
        );
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let err = SettingsValidator::validate(
            &MigrationSettings::default()
                .with_chunk_size(0)
                .with_page_size(0),
        )
        .unwrap_err();

        match err {
            SettingsError::ValidationFailed(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[traced_test]
    fn large_chunks_only_warn() {
        let validated =
            SettingsValidator::validate(&MigrationSettings::default().with_chunk_size(200_000))
                .unwrap();
        assert_eq!(validated.chunk_size, 200_000);
        assert!(logs_contain("very large"));
    }
}
