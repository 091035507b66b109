//! 期望值計算核心
//!
//! 包含卡盒期望值計算的所有純邏輯：
//! - `constants`: 預設常量
//! - `rarity`: 稀有度組成、重複策略
//! - `roster`: 已定價卡片
//! - `expectation`: 閉式期望值引擎
//! - `profit`: 獲利機率啟發式
//! - `simulation`: Monte Carlo 模擬
//! - `adapter`: 外部輸入正規化
//!
//! 本模組不做任何 I/O，也不持有共享狀態

pub mod constants;
pub mod rarity;
pub mod roster;
pub mod expectation;
pub mod profit;
pub mod simulation;
pub mod adapter;

pub use constants::*;
pub use rarity::{RarityComposition, DuplicatePolicy};
pub use roster::{PricedCard, group_by_rarity, resolve_price};
pub use expectation::{
    calculate_box_expectation, duplicate_free_expectation, with_replacement_expectation,
    CalculationResult, RarityBreakdown,
};
pub use profit::{ProfitThresholds, ThresholdStep, ThresholdError};
pub use simulation::{
    calculate_detailed_expectation, run_simulation, DetailedExpectation, Histogram, HistogramBin,
    SimulationError, SimulationOptions, SimulationPlan, SimulationProgress,
};
pub use adapter::{
    build_composition, cards_from_inputs, check_box_price, AdapterError, BoxInput, CardInput,
    PreparedBox, RarityRef, RaritySetting,
};
