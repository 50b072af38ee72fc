use metering_core::domain::{TariffConfig, TariffSchedule};
use metering_core::InvalidTariffError;
use serde::Deserialize;
use std::{fs, path::PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingsFormat {
    #[default]
    Ndjson,
    Csv,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadingsConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: ReadingsFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub invoice_dir: PathBuf,
    /// Daily consumption CSV; stdout when unset.
    #[serde(default)]
    pub daily_csv_path: Option<PathBuf>,
}

fn default_due_days() -> i64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceConfig {
    #[serde(default = "default_due_days")]
    pub due_days: i64,
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            due_days: default_due_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub tariff: TariffConfig,
    pub readings: ReadingsConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub invoice: InvoiceConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("BILLING_CONFIG").unwrap_or_else(|_| "billing-config.toml".to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config '{path}': {e}"))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        if cfg.invoice.due_days < 0 {
            anyhow::bail!("invoice.due_days must be non-negative, got {}", cfg.invoice.due_days);
        }
        Ok(cfg)
    }

    /// Validated tariff. Call once at startup so a bad tariff stops the job
    /// before anything is billed.
    pub fn tariff_schedule(&self) -> Result<TariffSchedule, InvalidTariffError> {
        TariffSchedule::try_from(&self.tariff)
    }
}
