// In crates/app-config/src/types.rs

use execution::ExecutionSettings;
use risk::RiskParameters;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    pub portfolio: PortfolioSettings,
    pub risk: RiskParameters,
    pub execution: ExecutionSettings,
    pub metrics: MetricsSettings,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
    /// Capacity of the engine's inbound mailbox.
    pub mailbox_capacity: usize,
    /// Capacity of the pipeline event broadcast channel.
    pub event_capacity: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            mailbox_capacity: 256,
            event_capacity: 1024,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PortfolioSettings {
    /// Starting portfolio value in quote currency.
    pub initial_value: Decimal,
}

impl Default for PortfolioSettings {
    fn default() -> Self {
        Self {
            initial_value: dec!(100000),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MetricsSettings {
    /// How many execution results the metrics recorder retains.
    pub history_limit: usize,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self { history_limit: 100 }
    }
}
