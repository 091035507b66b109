//! 服務設定
//!
//! 設定檔為 JSON，所有欄位皆有預設值；未提供設定檔時使用預設設定。

use std::net::{AddrParseError, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::calc::{
    DuplicatePolicy, ProfitThresholds, SimulationOptions, ThresholdError, ThresholdStep,
    DEFAULT_BULK_RARITIES, DEFAULT_PROFIT_FLOOR, DEFAULT_PROFIT_STEPS, DEFAULT_SIMULATIONS,
    HISTOGRAM_BINS, MAX_SIMULATIONS, SIMULATION_BATCH_SIZE,
};

/// 設定錯誤
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid listen address: {0}")]
    Addr(#[from] AddrParseError),

    #[error("invalid profit thresholds: {0}")]
    Thresholds(#[from] ThresholdError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// 獲利機率門檻表設定
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThresholdsConfig {
    pub steps: Vec<ThresholdStep>,
    pub floor: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            steps: DEFAULT_PROFIT_STEPS
                .iter()
                .map(|&(min_ratio, probability)| ThresholdStep { min_ratio, probability })
                .collect(),
            floor: DEFAULT_PROFIT_FLOOR,
        }
    }
}

/// 服務設定
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    pub listen_addr: String,
    /// 計算結果快取秒數（0 = 不快取）
    pub cache_ttl_secs: u64,
    pub default_simulations: usize,
    pub max_simulations: usize,
    pub simulation_batch_size: usize,
    pub histogram_bins: usize,
    /// 允許同盒重複的稀有度
    pub bulk_rarities: Vec<String>,
    pub profit_thresholds: ThresholdsConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:50052".to_string(),
            cache_ttl_secs: 300,
            default_simulations: DEFAULT_SIMULATIONS,
            max_simulations: MAX_SIMULATIONS,
            simulation_batch_size: SIMULATION_BATCH_SIZE,
            histogram_bins: HISTOGRAM_BINS,
            bulk_rarities: DEFAULT_BULK_RARITIES.iter().map(|s| s.to_string()).collect(),
            profit_thresholds: ThresholdsConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// 讀取設定檔（未指定則使用預設值）並驗證
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_json(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        self.thresholds()?;
        if self.simulation_batch_size == 0 {
            return Err(ConfigError::Invalid("simulationBatchSize must be positive".into()));
        }
        if self.histogram_bins == 0 {
            return Err(ConfigError::Invalid("histogramBins must be positive".into()));
        }
        if self.max_simulations == 0 {
            return Err(ConfigError::Invalid("maxSimulations must be positive".into()));
        }
        if self.default_simulations == 0 || self.default_simulations > self.max_simulations {
            return Err(ConfigError::Invalid(format!(
                "defaultSimulations must be within 1..={}",
                self.max_simulations
            )));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(self.listen_addr.parse()?)
    }

    pub fn thresholds(&self) -> Result<ProfitThresholds, ThresholdError> {
        ProfitThresholds::new(
            self.profit_thresholds.steps.clone(),
            self.profit_thresholds.floor,
        )
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        DuplicatePolicy::new(&self.bulk_rarities)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// 請求的模擬選項：0 表示預設次數，超過上限時截斷
    pub fn simulation_options(&self, requested: usize, seed: Option<u64>) -> SimulationOptions {
        let simulations = if requested == 0 {
            self.default_simulations
        } else {
            requested.min(self.max_simulations)
        };
        SimulationOptions {
            simulations,
            seed,
            batch_size: self.simulation_batch_size,
            histogram_bins: self.histogram_bins,
        }
    }
}

// ============================================================================
// 單元測試
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds().unwrap(), ProfitThresholds::default());
        assert!(config.duplicate_policy().allows_duplicates("C"));
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ServiceConfig::from_json(
            r#"{ "listenAddr": "0.0.0.0:6000", "bulkRarities": ["N", "R"], "cacheTtlSecs": 0 }"#,
        )
        .unwrap();
        assert_eq!(config.socket_addr().unwrap().port(), 6000);
        assert_eq!(config.cache_ttl_secs, 0);
        assert_eq!(config.default_simulations, DEFAULT_SIMULATIONS);
        let policy = config.duplicate_policy();
        assert!(policy.allows_duplicates("R"));
        assert!(!policy.allows_duplicates("C"));
    }

    #[test]
    fn test_custom_thresholds() {
        let config = ServiceConfig::from_json(
            r#"{ "profitThresholds": { "steps": [{ "minRatio": 1.0, "probability": 50 }], "floor": 0 } }"#,
        )
        .unwrap();
        let thresholds = config.thresholds().unwrap();
        assert_eq!(thresholds.probability_for_ratio(1.1), 50.0);
        assert_eq!(thresholds.probability_for_ratio(0.9), 0.0);
    }

    #[test]
    fn test_validation_failures() {
        let bad_addr = ServiceConfig { listen_addr: "nowhere".into(), ..ServiceConfig::default() };
        assert!(matches!(bad_addr.validate(), Err(ConfigError::Addr(_))));

        let bad_bins = ServiceConfig { histogram_bins: 0, ..ServiceConfig::default() };
        assert!(matches!(bad_bins.validate(), Err(ConfigError::Invalid(_))));

        let bad_sims = ServiceConfig {
            default_simulations: 10,
            max_simulations: 5,
            ..ServiceConfig::default()
        };
        assert!(matches!(bad_sims.validate(), Err(ConfigError::Invalid(_))));

        let bad_table = ServiceConfig::from_json(
            r#"{ "profitThresholds": { "steps": [{ "minRatio": 1.0, "probability": 10 }], "floor": 50 } }"#,
        )
        .unwrap();
        assert!(matches!(bad_table.validate(), Err(ConfigError::Thresholds(_))));
    }

    #[test]
    fn test_simulation_options_clamp() {
        let config = ServiceConfig { max_simulations: 1_000, default_simulations: 200, ..ServiceConfig::default() };
        assert_eq!(config.simulation_options(0, None).simulations, 200);
        assert_eq!(config.simulation_options(500, Some(3)).simulations, 500);
        assert_eq!(config.simulation_options(50_000, None).simulations, 1_000);
        assert_eq!(config.simulation_options(1, Some(3)).seed, Some(3));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        assert_eq!(ServiceConfig::load(None).unwrap(), ServiceConfig::default());
    }
}
