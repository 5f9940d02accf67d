//! # PACS管理模块
//!
//! 桥接服务的配置加载与验证，以及外部依赖的存活探针。

pub mod config;
pub mod monitoring;

pub use config::{BridgeConfig, ConfigValidator};
pub use monitoring::{LivenessProbe, ProbeTargets};
