//! # PACS Web模块
//!
//! 桥接服务的 HTTP 接口：归档推送通知入口、状态快照、工作列表快照和健康检查。

pub mod handlers;
pub mod server;

pub use handlers::{ApiError, AppState};
pub use server::{router, WebServer};
