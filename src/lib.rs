//! 卡盒期望值引擎
//!
//! - `calc`: 期望值計算核心（閉式引擎、Monte Carlo、輸入正規化）
//! - `service`: gRPC 服務層
//! - `proto`: 由 `proto/box_ev.proto` 生成的訊息與服務定義

pub mod proto {
    tonic::include_proto!("boxev");
}

pub mod calc;
pub mod service;
