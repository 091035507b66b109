//! Monte Carlo 開盒模擬
//!
//! 每次試驗模擬開一盒：
//! - 允許重複的稀有度：放回抽樣 `cards_per_box` 張
//! - 不允許重複的稀有度：不放回抽樣 `min(cards_per_box, 卡片數)` 張
//!
//! 小數張數以 `floor(n)` 張加上機率 `fract(n)` 的額外一張表示，
//! 模擬平均值因此收斂到閉式期望值。
//!
//! 隨機來源一律由呼叫端注入；平行版本以 (seed, 批次索引) 為每批建立獨立 RNG，
//! 相同 seed 的結果與執行緒數量無關。

use std::ops::ControlFlow;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::constants::{
    DEFAULT_SIMULATIONS, HISTOGRAM_BINS, MAX_CARDS_PER_BOX, SIMULATION_BATCH_SIZE,
};
use super::rarity::RarityComposition;
use super::roster::{group_by_rarity, PricedCard};

/// 模擬錯誤
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error("simulation cancelled after {completed} of {total} trials")]
    Cancelled { completed: usize, total: usize },

    #[error("invalid simulation options: {0}")]
    InvalidOptions(&'static str),
}

// ============================================================================
// 模擬計畫
// ============================================================================

/// 單一稀有度的抽樣設定
#[derive(Clone, Debug)]
struct SlotPlan {
    prices: Vec<u64>,
    draws: f64,
    with_replacement: bool,
}

impl SlotPlan {
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> u128 {
        let count = draw_count(self.draws, rng);
        if count == 0 {
            return 0;
        }
        if self.with_replacement {
            (0..count)
                .map(|_| u128::from(self.prices[rng.gen_range(0..self.prices.len())]))
                .sum()
        } else {
            let amount = count.min(self.prices.len());
            index::sample(rng, self.prices.len(), amount)
                .iter()
                .map(|i| u128::from(self.prices[i]))
                .sum()
        }
    }
}

/// 整數部分必抽，小數部分以機率決定是否多抽一張
fn draw_count<R: Rng + ?Sized>(draws: f64, rng: &mut R) -> usize {
    let whole = draws.floor();
    let fraction = draws - whole;
    let mut count = whole as usize;
    if fraction > 0.0 && rng.gen_bool(fraction) {
        count += 1;
    }
    count
}

/// 預先分組的模擬計畫（一次建立，多次開盒）
#[derive(Clone, Debug, Default)]
pub struct SimulationPlan {
    slots: Vec<SlotPlan>,
}

impl SimulationPlan {
    pub fn new(cards: &[PricedCard], composition: &[RarityComposition]) -> Self {
        let groups = group_by_rarity(cards);
        let slots = composition
            .iter()
            .filter(|rarity| !rarity.is_degenerate())
            .filter_map(|rarity| {
                let group = groups.get(rarity.rarity_name.as_str())?;
                if group.is_empty() {
                    return None;
                }
                // 每盒張數上限，避免單次試驗無限抽樣
                let cards_per_box = rarity.effective_cards_per_box().min(MAX_CARDS_PER_BOX);
                let draws = if rarity.allows_duplicates {
                    cards_per_box
                } else {
                    cards_per_box.min(group.len() as f64)
                };
                Some(SlotPlan {
                    prices: group.iter().map(|card| card.price).collect(),
                    draws,
                    with_replacement: rarity.allows_duplicates,
                })
            })
            .collect();
        Self { slots }
    }

    /// 參與模擬的稀有度數
    pub fn rarity_count(&self) -> usize {
        self.slots.len()
    }

    /// 模擬開一盒，回傳總價值
    pub fn open_box<R: Rng + ?Sized>(&self, rng: &mut R) -> u128 {
        self.slots.iter().map(|slot| slot.draw(rng)).sum()
    }
}

// ============================================================================
// 結果
// ============================================================================

/// 直方圖分箱
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HistogramBin {
    /// 分箱中心值
    pub value: f64,
    pub frequency: u64,
}

/// 等寬直方圖
pub struct Histogram;

impl Histogram {
    /// 在 [min, max] 區間內切成 `bins` 個等寬分箱；區間寬度為 0 時只有一個分箱
    pub fn from_totals(totals: &[u128], bins: usize) -> Vec<HistogramBin> {
        let (Some(&min), Some(&max)) = (totals.iter().min(), totals.iter().max()) else {
            return Vec::new();
        };
        if bins == 0 {
            return Vec::new();
        }
        if min == max {
            return vec![HistogramBin {
                value: min as f64,
                frequency: totals.len() as u64,
            }];
        }

        let width = (max - min) as f64 / bins as f64;
        let mut counts = vec![0u64; bins];
        for &total in totals {
            let idx = (((total - min) as f64) / width) as usize;
            counts[idx.min(bins - 1)] += 1;
        }

        counts
            .into_iter()
            .enumerate()
            .map(|(i, frequency)| HistogramBin {
                value: min as f64 + width * (i as f64 + 0.5),
                frequency,
            })
            .collect()
    }
}

/// 模擬結果
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedExpectation {
    pub expected_value: f64,
    /// 總價值 >= 售價的試驗比例（0..=100）
    pub plus_probability: f64,
    pub distribution: Vec<HistogramBin>,
    pub simulations: usize,
    /// 平行版本實際使用的 seed（注入 RNG 時為 None）
    pub seed: Option<u64>,
}

impl DetailedExpectation {
    fn from_totals(totals: &[u128], box_price: f64, bins: usize, seed: Option<u64>) -> Self {
        let simulations = totals.len();
        if simulations == 0 {
            return Self {
                expected_value: 0.0,
                plus_probability: 0.0,
                distribution: Vec::new(),
                simulations,
                seed,
            };
        }

        let sum: f64 = totals.iter().map(|&t| t as f64).sum();
        let expected_value = sum / simulations as f64;

        let plus_probability = if box_price.is_finite() && box_price > 0.0 {
            let wins = totals.iter().filter(|&&t| t as f64 >= box_price).count();
            100.0 * wins as f64 / simulations as f64
        } else {
            0.0
        };

        Self {
            expected_value,
            plus_probability,
            distribution: Histogram::from_totals(totals, bins),
            simulations,
            seed,
        }
    }
}

// ============================================================================
// 執行
// ============================================================================

/// 以注入的 RNG 依序模擬 `simulations` 次
pub fn calculate_detailed_expectation<R: Rng + ?Sized>(
    cards: &[PricedCard],
    composition: &[RarityComposition],
    box_price: f64,
    simulations: usize,
    rng: &mut R,
) -> DetailedExpectation {
    let plan = SimulationPlan::new(cards, composition);
    let totals: Vec<u128> = (0..simulations).map(|_| plan.open_box(rng)).collect();
    DetailedExpectation::from_totals(&totals, box_price, HISTOGRAM_BINS, None)
}

/// 平行模擬選項
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationOptions {
    pub simulations: usize,
    pub seed: Option<u64>,
    pub batch_size: usize,
    pub histogram_bins: usize,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            simulations: DEFAULT_SIMULATIONS,
            seed: None,
            batch_size: SIMULATION_BATCH_SIZE,
            histogram_bins: HISTOGRAM_BINS,
        }
    }
}

/// 模擬進度
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimulationProgress {
    pub completed: usize,
    pub total: usize,
}

/// 批次平行模擬
///
/// 每一波平行執行與 rayon 執行緒數相同的批次，完成後回報進度；
/// `on_progress` 回傳 `ControlFlow::Break(())` 即取消。
pub fn run_simulation<F>(
    plan: &SimulationPlan,
    options: &SimulationOptions,
    box_price: f64,
    mut on_progress: F,
) -> Result<DetailedExpectation, SimulationError>
where
    F: FnMut(SimulationProgress) -> ControlFlow<()>,
{
    if options.batch_size == 0 {
        return Err(SimulationError::InvalidOptions("batch size must be positive"));
    }
    if options.histogram_bins == 0 {
        return Err(SimulationError::InvalidOptions("histogram needs at least one bin"));
    }

    let seed = options.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let total = options.simulations;
    let batch_count = total.div_ceil(options.batch_size);
    let wave_size = rayon::current_num_threads().max(1);

    let mut totals = Vec::with_capacity(total);
    let mut next_batch = 0;
    while next_batch < batch_count {
        let wave_end = (next_batch + wave_size).min(batch_count);
        let wave: Vec<Vec<u128>> = (next_batch..wave_end)
            .into_par_iter()
            .map(|batch| {
                let start = batch * options.batch_size;
                let len = options.batch_size.min(total - start);
                let mut rng = StdRng::seed_from_u64(batch_seed(seed, batch as u64));
                (0..len).map(|_| plan.open_box(&mut rng)).collect::<Vec<u128>>()
            })
            .collect();
        for batch in wave {
            totals.extend(batch);
        }
        next_batch = wave_end;

        let progress = SimulationProgress {
            completed: totals.len(),
            total,
        };
        debug!(completed = progress.completed, total, "simulation wave finished");
        if on_progress(progress).is_break() {
            return Err(SimulationError::Cancelled {
                completed: progress.completed,
                total,
            });
        }
    }

    Ok(DetailedExpectation::from_totals(
        &totals,
        box_price,
        options.histogram_bins,
        Some(seed),
    ))
}

fn batch_seed(seed: u64, batch: u64) -> u64 {
    seed ^ batch.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

// ============================================================================
// 單元測試
// ============================================================================
