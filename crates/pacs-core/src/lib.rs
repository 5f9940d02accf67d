//! # PACS Core
//!
//! 影像桥接服务的核心模块：统一错误类型、订单与台账数据模型、
//! 检查设备类型分类器、检查号生成规则以及状态快照。

pub mod error;
pub mod health;
pub mod modality;
pub mod models;
pub mod status;
pub mod utils;

pub use error::{PacsError, ResolutionOutcome, Result};
pub use health::HealthCheck;
pub use modality::{classify, Modality};
pub use models::*;
pub use status::{StatusBoard, StatusSnapshot, WorklistBoard, WorklistSummary};
