//! 稀有度組成與重複策略
//!
//! `RarityComposition` 是引擎唯一接受的稀有度形狀；
//! `DuplicatePolicy` 決定某稀有度在同一盒內是否可能抽到相同卡片。

use std::collections::HashSet;

use super::constants::DEFAULT_BULK_RARITIES;

/// 單一稀有度在一盒中的組成
#[derive(Clone, Debug, PartialEq)]
pub struct RarityComposition {
    /// 稀有度代號（例如 "C", "SR", "MR"），在同一卡盒內唯一
    pub rarity_name: String,
    /// 此稀有度的卡片種類數
    pub total_types: u32,
    /// 每盒此稀有度的期望張數（可為小數，0.25 = 四盒一張）
    pub cards_per_box: f64,
    /// 同一盒內是否可能重複
    pub allows_duplicates: bool,
}

impl RarityComposition {
    pub fn new(
        rarity_name: impl Into<String>,
        total_types: u32,
        cards_per_box: f64,
        allows_duplicates: bool,
    ) -> Self {
        Self {
            rarity_name: rarity_name.into(),
            total_types,
            cards_per_box,
            allows_duplicates,
        }
    }

    /// 有效的每盒張數：NaN、無限或負值視為 0
    pub fn effective_cards_per_box(&self) -> f64 {
        if self.cards_per_box.is_finite() && self.cards_per_box >= 0.0 {
            self.cards_per_box
        } else {
            0.0
        }
    }

    /// 種類數為 0 的稀有度不貢獻期望值
    pub fn is_degenerate(&self) -> bool {
        self.total_types == 0
    }
}

/// 稀有度重複策略
///
/// 屬於「大量」集合的稀有度（一般為 Common/Uncommon）允許同盒重複，
/// 其餘稀有度視為同盒內互不相同。集合可由設定檔提供。
#[derive(Clone, Debug)]
pub struct DuplicatePolicy {
    bulk: HashSet<String>,
}

impl DuplicatePolicy {
    pub fn new<I, S>(bulk_rarities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            bulk: bulk_rarities
                .into_iter()
                .map(|name| normalize(name.as_ref()))
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    /// 該稀有度是否允許同盒重複
    pub fn allows_duplicates(&self, rarity_name: &str) -> bool {
        self.bulk.contains(&normalize(rarity_name))
    }

    pub fn len(&self) -> usize {
        self.bulk.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bulk.is_empty()
    }
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BULK_RARITIES)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

// ============================================================================
// 單元測試
// ============================================================================
