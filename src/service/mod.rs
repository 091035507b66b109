//! 服務層模組
//!
//! 提供 gRPC 服務所需的設定、快取、型別轉換與服務實作

pub mod cache;
pub mod config;
pub mod convert;
pub mod server;

pub use cache::{CacheKey, ExpectationCache};
pub use config::{ConfigError, ServiceConfig, ThresholdsConfig};
pub use server::BoxEvService;
