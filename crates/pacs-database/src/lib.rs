//! # PACS数据库模块
//!
//! 医院信息系统的订单仓库 (MySQL) 与派发台账 (PostgreSQL)，以及测试用的内存实现。

pub mod connection;
pub mod ledger;
pub mod memory;
pub mod models;
pub mod orders;

// 重新导出主要类型
pub use connection::{connect_hospital, connect_ledger, PoolSettings};
pub use ledger::{DispatchLedger, PgDispatchLedger};
pub use memory::{MemoryDispatchLedger, MemoryOrderRepository};
pub use models::*;
pub use orders::{MySqlOrderRepository, OrderRepository};
