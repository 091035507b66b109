//! 卡表（已定價卡片）

use std::collections::HashMap;

/// 已定價卡片
///
/// `price` 為整數貨幣單位。0 是有效價格（沒有轉售價值），
/// 與「價格未知」不同，引擎不會過濾掉 0 元卡片。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PricedCard {
    pub id: String,
    pub rarity_name: String,
    pub price: u64,
}

impl PricedCard {
    pub fn new(id: impl Into<String>, rarity_name: impl Into<String>, price: u64) -> Self {
        Self {
            id: id.into(),
            rarity_name: rarity_name.into(),
            price,
        }
    }
}

/// 依稀有度分組（保留原始順序）
pub fn group_by_rarity(cards: &[PricedCard]) -> HashMap<&str, Vec<&PricedCard>> {
    let mut groups: HashMap<&str, Vec<&PricedCard>> = HashMap::new();
    for card in cards {
        groups.entry(card.rarity_name.as_str()).or_default().push(card);
    }
    groups
}

/// 價格解析：使用者價格 > 參考價格 > 0
///
/// 供呼叫端在組裝卡表時使用，引擎本身不做任何價格替代。
pub fn resolve_price(user_price: Option<u64>, reference_price: Option<u64>) -> u64 {
    user_price.or(reference_price).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_rarity_keeps_zero_priced_cards() {
        let cards = vec![
            PricedCard::new("a", "SR", 1000),
            PricedCard::new("b", "C", 10),
            PricedCard::new("c", "SR", 0),
        ];
        let groups = group_by_rarity(&cards);
        assert_eq!(groups.len(), 2);
        let sr: Vec<&str> = groups["SR"].iter().map(|c| c.id.as_str()).collect();
        assert_eq!(sr, vec!["a", "c"]);
        assert_eq!(groups["C"].len(), 1);
    }

    #[test]
    fn test_resolve_price_fallback_order() {
        assert_eq!(resolve_price(Some(300), Some(100)), 300);
        assert_eq!(resolve_price(Some(0), Some(100)), 0);
        assert_eq!(resolve_price(None, Some(100)), 100);
        assert_eq!(resolve_price(None, None), 0);
    }
}
