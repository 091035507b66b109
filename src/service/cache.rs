//! 計算結果快取
//!
//! 以請求參數為鍵、帶 TTL 的快取。由服務持有，可依卡盒明確失效。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::calc::{CalculationResult, PreparedBox};

/// 快取鍵：卡盒 ID + 正規化輸入的指紋
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub box_id: String,
    pub fingerprint: u64,
}

impl CacheKey {
    pub fn new(box_id: &str, prepared: &PreparedBox) -> Self {
        let mut hasher = DefaultHasher::new();
        prepared.box_price.to_bits().hash(&mut hasher);
        prepared.cards.hash(&mut hasher);
        for rarity in &prepared.composition {
            rarity.rarity_name.hash(&mut hasher);
            rarity.total_types.hash(&mut hasher);
            rarity.cards_per_box.to_bits().hash(&mut hasher);
            rarity.allows_duplicates.hash(&mut hasher);
        }
        Self {
            box_id: box_id.to_string(),
            fingerprint: hasher.finish(),
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    /// 完整輸入，命中時比對以排除指紋碰撞
    input: PreparedBox,
    result: CalculationResult,
    inserted_at: Instant,
}

/// 帶 TTL 的期望值快取
#[derive(Debug)]
pub struct ExpectationCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl ExpectationCache {
    /// TTL 為 0 時停用快取
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &CacheKey, input: &PreparedBox) -> Option<CalculationResult> {
        if self.ttl.is_zero() {
            return None;
        }
        // 過期即移除
        self.entries
            .remove_if(key, |_, entry| entry.inserted_at.elapsed() >= self.ttl);
        self.entries
            .get(key)
            .filter(|entry| entry.input == *input)
            .map(|entry| entry.result.clone())
    }

    pub fn insert(&self, key: CacheKey, input: PreparedBox, result: CalculationResult) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.insert(
            key,
            CacheEntry {
                input,
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    /// 移除某卡盒的所有快取，回傳移除數量
    pub fn invalidate_box(&self, box_id: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let keep = key.box_id != box_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// 清除所有過期項目
    pub fn purge_expired(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.inserted_at.elapsed() < self.ttl;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
