//! 閉式期望值引擎
//!
//! 純函數、無狀態、無 I/O。對每個稀有度：
//! - 允許重複：每張卡貢獻 `price × cards_per_box / total_types`（放回抽樣）
//! - 不允許重複：抽出 `k = min(cards_per_box, total_types)` 種不同卡，
//!   每種卡入選機率為 `k / total_types`
//!
//! 不完整的輸入（空卡表、種類數為 0、未知稀有度）一律退化為 0 貢獻，不會失敗。

use serde::Serialize;

use super::profit::ProfitThresholds;
use super::rarity::RarityComposition;
use super::roster::{group_by_rarity, PricedCard};

/// 單一稀有度的期望值明細
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RarityBreakdown {
    pub rarity_name: String,
    pub expected_value: f64,
    /// 佔總期望值的百分比（總期望值為 0 時為 0）
    pub contribution_percent: f64,
    /// 參與計算的卡片數
    pub card_count: usize,
}

/// 計算結果
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    pub expected_value: f64,
    /// 0..=100
    pub plus_probability: f64,
    /// 順序與輸入的組成表一致
    pub breakdown: Vec<RarityBreakdown>,
}

impl CalculationResult {
    pub fn empty() -> Self {
        Self {
            expected_value: 0.0,
            plus_probability: 0.0,
            breakdown: Vec::new(),
        }
    }
}

/// 計算開一盒的期望值
pub fn calculate_box_expectation(
    cards: &[PricedCard],
    composition: &[RarityComposition],
    box_price: f64,
    thresholds: &ProfitThresholds,
) -> CalculationResult {
    let groups = group_by_rarity(cards);

    let mut result = CalculationResult::empty();
    let mut priced_cards = 0usize;

    for rarity in composition {
        if rarity.is_degenerate() {
            continue;
        }
        let group = match groups.get(rarity.rarity_name.as_str()) {
            Some(group) if !group.is_empty() => group,
            _ => continue,
        };

        let cards_per_box = rarity.effective_cards_per_box();
        let value = if rarity.allows_duplicates {
            group
                .iter()
                .map(|card| with_replacement_expectation(card.price, cards_per_box, rarity.total_types))
                .sum::<f64>()
        } else {
            let price_sum: u128 = group.iter().map(|card| u128::from(card.price)).sum();
            duplicate_free_expectation(price_sum, cards_per_box, rarity.total_types)
        };

        result.expected_value += value;
        priced_cards += group.len();
        result.breakdown.push(RarityBreakdown {
            rarity_name: rarity.rarity_name.clone(),
            expected_value: value,
            contribution_percent: 0.0,
            card_count: group.len(),
        });
    }

    for entry in &mut result.breakdown {
        entry.contribution_percent = if result.expected_value > 0.0 {
            100.0 * entry.expected_value / result.expected_value
        } else {
            0.0
        };
    }

    result.plus_probability =
        thresholds.plus_probability(result.expected_value, box_price, priced_cards);
    result
}

/// 放回抽樣下單張卡的期望貢獻
pub fn with_replacement_expectation(price: u64, cards_per_box: f64, total_types: u32) -> f64 {
    if total_types == 0 {
        return 0.0;
    }
    price as f64 * (cards_per_box / total_types as f64)
}

/// 不重複抽樣下整個稀有度的期望貢獻
///
/// 從 `total_types` 種中均勻抽出 `k` 種不同卡片；
/// 由期望值線性，每種卡的入選機率皆為 `k / total_types`，與其他卡是否同時入選無關。
pub fn duplicate_free_expectation(price_sum: u128, cards_per_box: f64, total_types: u32) -> f64 {
    if total_types == 0 {
        return 0.0;
    }
    let total = total_types as f64;
    let k = cards_per_box.min(total);
    if k >= total {
        // 整套保證入盒
        return price_sum as f64;
    }
    price_sum as f64 * (k / total)
}

// ============================================================================
// 單元測試
// ============================================================================
