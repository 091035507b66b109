//! 輸入轉換層
//!
//! 外部資料（JSON、gRPC）在這裡統一轉成引擎接受的 `PricedCard` / `RarityComposition`。
//! 卡片的稀有度可能是字串，也可能是物件，兩種形狀都在此正規化。

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use thiserror::Error;

use super::constants::MAX_CARDS_PER_BOX;
use super::rarity::{DuplicatePolicy, RarityComposition};
use super::roster::{resolve_price, PricedCard};

/// 輸入錯誤
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("card has an empty id")]
    EmptyCardId,

    #[error("rarity name is empty (card or setting `{0}`)")]
    EmptyRarityName(String),

    #[error("rarity `{0}` is configured more than once")]
    DuplicateRarity(String),

    #[error("rarity `{rarity}` has invalid cards per box: {value}")]
    InvalidCardsPerBox { rarity: String, value: f64 },

    #[error("box price must be a finite non-negative number, got {0}")]
    InvalidBoxPrice(f64),

    #[error("failed to parse box input: {0}")]
    Json(#[from] serde_json::Error),
}

/// 稀有度參照：字串或物件
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RarityRef {
    Name(String),
    Object {
        #[serde(alias = "rarityName")]
        name: String,
    },
}

impl RarityRef {
    pub fn name(&self) -> &str {
        match self {
            RarityRef::Name(name) | RarityRef::Object { name } => name.trim(),
        }
    }
}

impl From<&str> for RarityRef {
    fn from(name: &str) -> Self {
        RarityRef::Name(name.to_string())
    }
}

/// 外部卡片資料
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInput {
    pub id: String,
    #[serde(alias = "rarityName")]
    pub rarity: RarityRef,
    /// 使用者輸入價格
    #[serde(default)]
    pub price: Option<u64>,
    /// 參考（目錄）價格
    #[serde(default)]
    pub reference_price: Option<u64>,
}

impl CardInput {
    pub fn into_priced(self) -> Result<PricedCard, AdapterError> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(AdapterError::EmptyCardId);
        }
        let rarity = self.rarity.name();
        if rarity.is_empty() {
            return Err(AdapterError::EmptyRarityName(id.to_string()));
        }
        Ok(PricedCard::new(
            id,
            rarity,
            resolve_price(self.price, self.reference_price),
        ))
    }
}

/// 管理員設定的稀有度組成
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaritySetting {
    #[serde(alias = "rarityName")]
    pub name: String,
    pub cards_per_box: f64,
    /// 未指定時由 `DuplicatePolicy` 判斷
    #[serde(default)]
    pub allows_duplicates: Option<bool>,
    /// 未指定時以卡表中該稀有度的卡片數計算
    #[serde(default)]
    pub total_types: Option<u32>,
}

impl RaritySetting {
    pub fn new(name: impl Into<String>, cards_per_box: f64) -> Self {
        Self {
            name: name.into(),
            cards_per_box,
            allows_duplicates: None,
            total_types: None,
        }
    }
}

pub fn cards_from_inputs(inputs: Vec<CardInput>) -> Result<Vec<PricedCard>, AdapterError> {
    inputs.into_iter().map(CardInput::into_priced).collect()
}

/// 由卡表與設定建立組成表（順序依設定）
pub fn build_composition(
    cards: &[PricedCard],
    settings: &[RaritySetting],
    policy: &DuplicatePolicy,
) -> Result<Vec<RarityComposition>, AdapterError> {
    let mut type_counts: HashMap<&str, u32> = HashMap::new();
    for card in cards {
        *type_counts.entry(card.rarity_name.as_str()).or_default() += 1;
    }

    let mut seen = HashSet::new();
    let mut composition = Vec::with_capacity(settings.len());
    for setting in settings {
        let name = setting.name.trim();
        if name.is_empty() {
            return Err(AdapterError::EmptyRarityName(setting.name.clone()));
        }
        if !seen.insert(name) {
            return Err(AdapterError::DuplicateRarity(name.to_string()));
        }
        if !(0.0..=MAX_CARDS_PER_BOX).contains(&setting.cards_per_box) {
            return Err(AdapterError::InvalidCardsPerBox {
                rarity: name.to_string(),
                value: setting.cards_per_box,
            });
        }

        let total_types = setting
            .total_types
            .unwrap_or_else(|| type_counts.get(name).copied().unwrap_or(0));
        let allows_duplicates = setting
            .allows_duplicates
            .unwrap_or_else(|| policy.allows_duplicates(name));

        composition.push(RarityComposition::new(
            name,
            total_types,
            setting.cards_per_box,
            allows_duplicates,
        ));
    }
    Ok(composition)
}

pub fn check_box_price(box_price: f64) -> Result<f64, AdapterError> {
    if box_price.is_finite() && box_price >= 0.0 {
        Ok(box_price)
    } else {
        Err(AdapterError::InvalidBoxPrice(box_price))
    }
}

/// 卡盒輸入文件（JSON）
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxInput {
    pub box_price: f64,
    #[serde(default)]
    pub rarities: Vec<RaritySetting>,
    #[serde(default)]
    pub cards: Vec<CardInput>,
}

/// 已正規化、可直接交給引擎的輸入
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedBox {
    pub cards: Vec<PricedCard>,
    pub composition: Vec<RarityComposition>,
    pub box_price: f64,
}

impl BoxInput {
    pub fn from_json(json: &str) -> Result<Self, AdapterError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn prepare(self, policy: &DuplicatePolicy) -> Result<PreparedBox, AdapterError> {
        let box_price = check_box_price(self.box_price)?;
        let cards = cards_from_inputs(self.cards)?;
        let composition = build_composition(&cards, &self.rarities, policy)?;
        Ok(PreparedBox {
            cards,
            composition,
            box_price,
        })
    }
}

// ============================================================================
// 單元測試
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "boxPrice": 3000,
        "rarities": [
            { "name": "SR", "cardsPerBox": 2 },
            { "rarityName": "C", "cardsPerBox": 40, "totalTypes": 50 }
        ],
        "cards": [
            { "id": "sr-1", "rarity": "SR", "price": 1000 },
            { "id": "sr-2", "rarity": { "name": "SR" }, "referencePrice": 500 },
            { "id": "sr-3", "rarity": { "rarityName": " SR ", "cardsPerBox": 2 }, "price": 0, "referencePrice": 800 },
            { "id": "sr-4", "rarityName": "SR", "price": 2500 },
            { "id": "c-1", "rarity": "C" }
        ]
    }"#;

    #[test]
    fn test_duck_typed_rarity_is_normalized() {
        let prepared = BoxInput::from_json(SAMPLE)
            .unwrap()
            .prepare(&DuplicatePolicy::default())
            .unwrap();

        let rarities: Vec<&str> = prepared.cards.iter().map(|c| c.rarity_name.as_str()).collect();
        assert_eq!(rarities, vec!["SR", "SR", "SR", "SR", "C"]);
        let prices: Vec<u64> = prepared.cards.iter().map(|c| c.price).collect();
        // 使用者價格 0 優先於參考價格
        assert_eq!(prices, vec![1000, 500, 0, 2500, 0]);
        assert_eq!(prepared.box_price, 3000.0);
    }

    #[test]
    fn test_composition_counts_roster_and_applies_policy() {
        let prepared = BoxInput::from_json(SAMPLE)
            .unwrap()
            .prepare(&DuplicatePolicy::default())
            .unwrap();

        assert_eq!(
            prepared.composition,
            vec![
                RarityComposition::new("SR", 4, 2.0, false),
                RarityComposition::new("C", 50, 40.0, true),
            ]
        );
    }

    #[test]
    fn test_explicit_duplicate_flag_overrides_policy() {
        let cards = vec![PricedCard::new("a", "R", 10)];
        let mut setting = RaritySetting::new("R", 3.0);
        setting.allows_duplicates = Some(true);
        let composition = build_composition(&cards, &[setting], &DuplicatePolicy::default()).unwrap();
        assert!(composition[0].allows_duplicates);
        assert_eq!(composition[0].total_types, 1);
    }

    #[test]
    fn test_setting_without_cards_has_zero_types() {
        let composition =
            build_composition(&[], &[RaritySetting::new("UR", 1.0)], &DuplicatePolicy::default()).unwrap();
        assert!(composition[0].is_degenerate());
    }

    #[test]
    fn test_rejects_bad_settings() {
        let policy = DuplicatePolicy::default();
        assert!(matches!(
            build_composition(&[], &[RaritySetting::new("SR", -1.0)], &policy),
            Err(AdapterError::InvalidCardsPerBox { .. })
        ));
        assert!(matches!(
            build_composition(&[], &[RaritySetting::new("C", 1e11)], &policy),
            Err(AdapterError::InvalidCardsPerBox { .. })
        ));
        assert!(build_composition(&[], &[RaritySetting::new("C", MAX_CARDS_PER_BOX)], &policy).is_ok());
        assert!(matches!(
            build_composition(&[], &[RaritySetting::new("SR", f64::NAN)], &policy),
            Err(AdapterError::InvalidCardsPerBox { .. })
        ));
        assert!(matches!(
            build_composition(&[], &[RaritySetting::new("SR", 1.0), RaritySetting::new(" SR", 2.0)], &policy),
            Err(AdapterError::DuplicateRarity(name)) if name == "SR"
        ));
        assert!(matches!(
            build_composition(&[], &[RaritySetting::new("  ", 1.0)], &policy),
            Err(AdapterError::EmptyRarityName(_))
        ));
    }

    #[test]
    fn test_rejects_bad_cards() {
        let blank_id = CardInput {
            id: " ".to_string(),
            rarity: "SR".into(),
            price: Some(1),
            reference_price: None,
        };
        assert!(matches!(blank_id.into_priced(), Err(AdapterError::EmptyCardId)));

        let blank_rarity = CardInput {
            id: "x".to_string(),
            rarity: RarityRef::Object { name: String::new() },
            price: None,
            reference_price: None,
        };
        assert!(matches!(blank_rarity.into_priced(), Err(AdapterError::EmptyRarityName(_))));
    }

    #[test]
    fn test_box_price_checks() {
        assert_eq!(check_box_price(0.0).unwrap(), 0.0);
        assert!(check_box_price(-5.0).is_err());
        assert!(check_box_price(f64::INFINITY).is_err());
    }

    #[test]
    fn test_malformed_json_is_reported() {
        assert!(matches!(BoxInput::from_json("{ \"cards\": [] }"), Err(AdapterError::Json(_))));
    }
}
