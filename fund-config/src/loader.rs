//! Configuration loading from TOML files.

use std::path::{Path, PathBuf};

use fund_policy::PolicyError;
use thiserror::Error;
use tracing::{debug, info};

use crate::schema::GateConfig;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML or does not match the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
    /// Criteria or engine settings were rejected by the policy crate.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Parses and validates configuration from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed input and other variants when
/// validation fails.
pub fn from_toml_str(input: &str) -> ConfigResult<GateConfig> {
    let config: GateConfig = toml::from_str(input)?;
    config.validate()?;
    Ok(config)
}

/// Reads, parses, and validates the configuration file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read, plus any error
/// from [`from_toml_str`].
pub fn load(path: impl AsRef<Path>) -> ConfigResult<GateConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = from_toml_str(&text)?;
    info!(
        path = %path.display(),
        criteria = config.criteria.len(),
        decision_window = config.decision_window,
        "configuration loaded"
    );
    Ok(config)
}

/// Loads `path` when given, otherwise falls back to the built-in defaults.
///
/// # Errors
///
/// Propagates errors from [`load`].
pub fn load_or_default(path: Option<&Path>) -> ConfigResult<GateConfig> {
    match path {
        Some(path) => load(path),
        None => {
            debug!("no config file given; using built-in funding rules");
            let config = GateConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use fund_policy::CriterionKind;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = from_toml_str("").unwrap();
        assert_eq!(config, GateConfig::default());
    }

    #[test]
    fn parses_overrides_and_custom_criteria() {
        let config = from_toml_str(
            r#"
            decision_window = 3
            max_amount_usdc = "250.50"
            audit_log_path = "/var/lib/fundgate/audit.jsonl"

            [persona]
            name = "Grant Bot"

            [[criterion]]
            id = "research"
            label = "protocol research"
            kind = "positive"
            keywords = ["research", "formal verification"]

            [[criterion]]
            id = "gambling"
            label = "gambling"
            kind = "disqualifying"
            keywords = ["casino"]
            "#,
        )
        .unwrap();

        assert_eq!(config.decision_window, 3);
        assert_eq!(config.max_amount_usdc.unwrap().to_string(), "250.5");
        assert_eq!(config.persona.name, "Grant Bot");
        assert_eq!(config.criteria.len(), 2);
        assert_eq!(config.criteria[1].kind, CriterionKind::Disqualifying);
        assert_eq!(config.engine_settings().unwrap().decision_window(), 3);
    }

    #[test]
    fn rejects_unknown_keys_and_invalid_values() {
        assert!(matches!(
            from_toml_str("decision_windw = 4"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            from_toml_str("decision_window = 0"),
            Err(ConfigError::Policy(_))
        ));
        assert!(matches!(
            from_toml_str("max_amount_usdc = \"-5\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_criteria_without_positive_entries() {
        let err = from_toml_str(
            r#"
            [[criterion]]
            id = "rent"
            label = "personal expenses"
            kind = "disqualifying"
            keywords = ["rent"]
            "#,
        )
        .expect_err("nothing could be approved");
        assert!(matches!(err, ConfigError::Policy(_)));
    }

    #[test]
    fn load_reads_files_and_reports_missing_ones() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "decision_window = 7").unwrap();
        assert_eq!(load(file.path()).unwrap().decision_window, 7);

        let err = load("/definitely/not/here.toml").expect_err("missing file");
        assert!(matches!(err, ConfigError::Io { .. }));

        assert_eq!(load_or_default(None).unwrap(), GateConfig::default());
    }
}
