//! 計算常量定義

// ============================================================================
// Monte Carlo 常量
// ============================================================================

pub const DEFAULT_SIMULATIONS: usize = 10_000;   // 預設模擬次數
pub const MAX_SIMULATIONS: usize = 200_000;      // 單次請求模擬上限
pub const SIMULATION_BATCH_SIZE: usize = 1_000;  // 每批次模擬次數（各批次獨立 RNG）
pub const HISTOGRAM_BINS: usize = 20;            // 分佈直方圖分箱數
pub const MAX_CARDS_PER_BOX: f64 = 10_000.0;     // 單一稀有度每盒張數上限

// ============================================================================
// 稀有度策略常量
// ============================================================================

/// 預設允許同盒重複的「大量」稀有度（比對時已轉大寫）
pub const DEFAULT_BULK_RARITIES: [&str; 7] = [
    "C",
    "U",
    "UC",
    "N",
    "COMMON",
    "UNCOMMON",
    "NORMAL",
];

// ============================================================================
// 獲利機率啟發式常量
// ============================================================================

/// (最低期望值/售價比, 獲利機率%)，由高到低
pub const DEFAULT_PROFIT_STEPS: [(f64, f64); 5] = [
    (1.5, 95.0),
    (1.2, 80.0),
    (1.0, 60.0),
    (0.8, 30.0),
    (0.6, 10.0),
];
pub const DEFAULT_PROFIT_FLOOR: f64 = 5.0;  // 低於所有門檻時的機率
