//! Configuration validation.
//!
//! Enum-typed values (log level, format, output) are already checked while
//! parsing; this covers what the schema cannot express.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, QuipConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &QuipConfig) -> ConfigResult<()> {
    validate_bot(config)?;
    validate_directory(config)?;
    validate_logging(&config.logging)?;
    validate_letters(config)?;
    Ok(())
}

fn validate_bot(config: &QuipConfig) -> ConfigResult<()> {
    if config.bot.token.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.token"));
    }

    if let Some(app_token) = &config.bot.app_token
        && app_token.trim().is_empty()
    {
        return Err(ConfigError::validation("bot.app_token cannot be empty"));
    }

    Ok(())
}

fn validate_directory(config: &QuipConfig) -> ConfigResult<()> {
    if config.directory.ttl_secs == 0 {
        return Err(ConfigError::validation(
            "directory.ttl_secs must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(target) = logging.filters.keys().find(|t| t.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid log filter target: {target:?}"
        )));
    }

    Ok(())
}

fn validate_letters(config: &QuipConfig) -> ConfigResult<()> {
    let Some(letters) = &config.letters else {
        return Ok(());
    };

    for key in letters.keys() {
        if key.chars().count() != 1 {
            return Err(ConfigError::validation(format!(
                "Letter key {key:?} is invalid, must be a single character"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use quip_framework::LetterEmojis;

    use super::*;

    fn valid() -> QuipConfig {
        let mut config = QuipConfig::default();
        config.bot.token = "xoxb-test".into();
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_missing_token() {
        let result = validate_config(&QuipConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingField { field }) if field == "bot.token"));

        let mut config = valid();
        config.bot.token = "   ".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_ttl() {
        let mut config = valid();
        config.directory.ttl_secs = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = valid();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("quip.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_malformed_letter_key() {
        let mut config = valid();
        config.letters = Some(BTreeMap::from([(
            "ab".to_string(),
            LetterEmojis::Flat(vec!["ab".into()]),
        )]));

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("\"ab\""));
    }
}
