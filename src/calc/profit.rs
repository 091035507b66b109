//! 獲利機率啟發式
//!
//! 以「期望值 / 卡盒售價」比值查門檻表，得到粗略的獲利機率（0..=100）。
//! 門檻表是可設定的政策資料；任何被接受的表都保證結果隨比值單調不減。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{DEFAULT_PROFIT_FLOOR, DEFAULT_PROFIT_STEPS};

/// 門檻表錯誤
#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("threshold ratio must be finite and non-negative, got {0}")]
    InvalidRatio(f64),

    #[error("probability must be within 0..=100, got {0}")]
    InvalidProbability(f64),

    #[error("probability {lower} at ratio {ratio} exceeds the probability of a higher ratio")]
    NotMonotonic { ratio: f64, lower: f64 },
}

/// 單一門檻：比值 >= `min_ratio` 時機率為 `probability`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdStep {
    pub min_ratio: f64,
    pub probability: f64,
}

/// 門檻表（依 `min_ratio` 由高到低排序）
#[derive(Clone, Debug, PartialEq)]
pub struct ProfitThresholds {
    steps: Vec<ThresholdStep>,
    floor: f64,
}

impl ProfitThresholds {
    pub fn new(mut steps: Vec<ThresholdStep>, floor: f64) -> Result<Self, ThresholdError> {
        check_probability(floor)?;
        for step in &steps {
            if !step.min_ratio.is_finite() || step.min_ratio < 0.0 {
                return Err(ThresholdError::InvalidRatio(step.min_ratio));
            }
            check_probability(step.probability)?;
        }

        steps.sort_by(|a, b| b.min_ratio.total_cmp(&a.min_ratio));

        // 比值越高機率不得越低
        let mut ceiling = f64::INFINITY;
        for step in &steps {
            if step.probability > ceiling {
                return Err(ThresholdError::NotMonotonic {
                    ratio: step.min_ratio,
                    lower: step.probability,
                });
            }
            ceiling = step.probability;
        }
        if floor > ceiling {
            return Err(ThresholdError::NotMonotonic {
                ratio: 0.0,
                lower: floor,
            });
        }

        Ok(Self { steps, floor })
    }

    pub fn steps(&self) -> &[ThresholdStep] {
        &self.steps
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// 比值對應的機率
    pub fn probability_for_ratio(&self, ratio: f64) -> f64 {
        self.steps
            .iter()
            .find(|step| ratio >= step.min_ratio)
            .map(|step| step.probability)
            .unwrap_or(self.floor)
    }

    /// 獲利機率
    ///
    /// `priced_cards` 為實際參與計算的卡片數；為 0、或售價非正數時回傳 0。
    pub fn plus_probability(&self, expected_value: f64, box_price: f64, priced_cards: usize) -> f64 {
        if priced_cards == 0 || !box_price.is_finite() || box_price <= 0.0 {
            return 0.0;
        }
        let ratio = expected_value / box_price;
        if !ratio.is_finite() {
            return 0.0;
        }
        self.probability_for_ratio(ratio)
    }
}

impl Default for ProfitThresholds {
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

fn check_probability(probability: f64) -> Result<(), ThresholdError> {
    if (0.0..=100.0).contains(&probability) {
        Ok(())
    } else {
        Err(ThresholdError::InvalidProbability(probability))
    }
}

// ============================================================================
// 單元測試
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_brackets() {
        let t = ProfitThresholds::default();
        assert_eq!(t.plus_probability(1500.0, 1000.0, 1), 95.0);
        assert_eq!(t.plus_probability(1499.0, 1000.0, 1), 80.0);
        assert_eq!(t.plus_probability(1200.0, 1000.0, 1), 80.0);
        assert_eq!(t.plus_probability(1000.0, 1000.0, 1), 60.0);
        assert_eq!(t.plus_probability(800.0, 1000.0, 1), 30.0);
        assert_eq!(t.plus_probability(600.0, 1000.0, 1), 10.0);
        assert_eq!(t.plus_probability(599.0, 1000.0, 1), 5.0);
        assert_eq!(t.plus_probability(0.0, 1000.0, 1), 5.0);
    }

    #[test]
    fn test_no_priced_cards_is_zero() {
        let t = ProfitThresholds::default();
        assert_eq!(t.plus_probability(5000.0, 1000.0, 0), 0.0);
    }

    #[test]
    fn test_invalid_box_price_is_zero() {
        let t = ProfitThresholds::default();
        assert_eq!(t.plus_probability(2000.0, 0.0, 3), 0.0);
        assert_eq!(t.plus_probability(2000.0, -10.0, 3), 0.0);
        assert_eq!(t.plus_probability(2000.0, f64::NAN, 3), 0.0);
    }

    #[test]
    fn test_custom_table_is_sorted() {
        let t = ProfitThresholds::new(
            vec![
                ThresholdStep { min_ratio: 1.0, probability: 50.0 },
                ThresholdStep { min_ratio: 2.0, probability: 90.0 },
            ],
            1.0,
        )
        .unwrap();
        assert_eq!(t.steps()[0].min_ratio, 2.0);
        assert_eq!(t.probability_for_ratio(2.5), 90.0);
        assert_eq!(t.probability_for_ratio(1.5), 50.0);
        assert_eq!(t.probability_for_ratio(0.5), 1.0);
    }

    #[test]
    fn test_rejects_decreasing_table() {
        let err = ProfitThresholds::new(
            vec![
                ThresholdStep { min_ratio: 2.0, probability: 40.0 },
                ThresholdStep { min_ratio: 1.0, probability: 60.0 },
            ],
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, ThresholdError::NotMonotonic { .. }));

        let err = ProfitThresholds::new(
            vec![ThresholdStep { min_ratio: 1.0, probability: 10.0 }],
            20.0,
        )
        .unwrap_err();
        assert!(matches!(err, ThresholdError::NotMonotonic { .. }));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert_eq!(
            ProfitThresholds::new(vec![ThresholdStep { min_ratio: 1.0, probability: 120.0 }], 0.0),
            Err(ThresholdError::InvalidProbability(120.0))
        );
        assert_eq!(
            ProfitThresholds::new(vec![ThresholdStep { min_ratio: -1.0, probability: 10.0 }], 0.0),
            Err(ThresholdError::InvalidRatio(-1.0))
        );
        assert!(ProfitThresholds::new(vec![], 101.0).is_err());
    }

    #[test]
    fn test_default_table_matches_new() {
        let steps = ProfitThresholds::default().steps().to_vec();
        let rebuilt = ProfitThresholds::new(steps, DEFAULT_PROFIT_FLOOR).unwrap();
        assert_eq!(rebuilt, ProfitThresholds::default());
    }
}
