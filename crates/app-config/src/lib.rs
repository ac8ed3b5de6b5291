// In crates/app-config/src/lib.rs

use config::{Config, Environment, File, FileFormat};
use rust_decimal::Decimal;

pub mod error;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use types::{AppSettings, MetricsSettings, PortfolioSettings, Settings};

/// Loads the application settings from various sources.
///
/// This function orchestrates the layered configuration loading:
/// 1. Reads from a default `base.toml` file.
/// 2. Merges settings from an environment-specific file (e.g., `development.toml`).
/// 3. Merges settings from environment variables.
pub fn load_settings() -> Result<Settings> {
    // Get the current environment. Default to "development" if not set.
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

    let settings = Config::builder()
        .add_source(File::with_name("config/base").required(false))
        .add_source(File::with_name(&format!("config/{}", environment)).required(false))
        // e.g. `APP__RISK__MAX_DRAWDOWN=0.2`. The prefix separator follows `separator`.
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    validate(&settings)?;
    Ok(settings)
}

/// Parses settings from a TOML string, applying the same defaults and checks
/// as [`load_settings`].
pub fn settings_from_toml(content: &str) -> Result<Settings> {
    let settings: Settings = Config::builder()
        .add_source(File::from_str(content, FileFormat::Toml))
        .build()?
        .try_deserialize()?;
    validate(&settings)?;
    Ok(settings)
}

/// Loads settings from a single TOML file, bypassing the layered lookup.
pub fn load_settings_file(path: &str) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    // Surface syntax errors with line information before layering.
    toml::from_str::<toml::Value>(&content)?;
    settings_from_toml(&content)
}

fn validate(settings: &Settings) -> Result<()> {
    settings
        .risk
        .validate()
        .map_err(|e| Error::Invalid(e.to_string()))?;
    if settings.portfolio.initial_value <= Decimal::ZERO {
        return Err(Error::Invalid(format!(
            "portfolio.initial_value must be positive, got {}",
            settings.portfolio.initial_value
        )));
    }
    if settings.execution.retry_attempts == 0 {
        return Err(Error::Invalid("execution.retry_attempts must be at least 1".to_string()));
    }
    let probability = settings.execution.limit_fill_probability;
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(Error::Invalid(format!(
            "execution.limit_fill_probability must be within [0, 1], got {probability}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::ExecutionStrategy;
    use risk::PositionSizing;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = settings_from_toml("").unwrap();
        assert_eq!(settings.app.log_level, "info");
        assert_eq!(settings.portfolio.initial_value, dec!(100000));
        assert_eq!(settings.risk.max_position_size, dec!(0.1));
        assert_eq!(settings.execution.retry_attempts, 3);
        assert_eq!(settings.metrics.history_limit, 100);
    }

    #[test]
    fn sections_override_defaults() {
        let settings = settings_from_toml(
            r#"
            [portfolio]
            initial_value = 50000

            [risk]
            max_drawdown = 0.2
            position_sizing = "fixed-size"

            [execution]
            default_strategy = "iceberg"
            retry_attempts = 5
            order_size_limit = 25000
            "#,
        )
        .unwrap();
        assert_eq!(settings.portfolio.initial_value, dec!(50000));
        assert_eq!(settings.risk.max_drawdown, dec!(0.2));
        assert_eq!(settings.risk.position_sizing, PositionSizing::FixedSize);
        assert_eq!(settings.risk.max_total_exposure, dec!(0.8));
        assert_eq!(settings.execution.default_strategy, ExecutionStrategy::Iceberg);
        assert_eq!(settings.execution.retry_attempts, 5);
        assert_eq!(settings.execution.order_size_limit, Some(dec!(25000)));
    }

    #[test]
    fn rejects_out_of_range_risk_limits() {
        let err = settings_from_toml("[risk]\nmax_drawdown = 1.5\n").unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn rejects_zero_retry_attempts() {
        let err = settings_from_toml("[execution]\nretry_attempts = 0\n").unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn limit_fill_probability_must_be_a_probability() {
        for raw in ["1.5", "-0.1", "nan"] {
            let doc = format!("[execution]\nlimit_fill_probability = {raw}\n");
            let err = settings_from_toml(&doc).unwrap_err();
            assert!(err.to_string().contains("limit_fill_probability"), "{raw}: {err}");
        }

        let mut settings = Settings::default();
        settings.execution.limit_fill_probability = f64::NAN;
        assert!(matches!(validate(&settings), Err(Error::Invalid(_))));

        settings.execution.limit_fill_probability = 1.0;
        assert!(validate(&settings).is_ok());
    }
}
