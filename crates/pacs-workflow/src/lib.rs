//! # PACS工作流模块
//!
//! 订单派发循环与报告对账（推送、定时扫描两个入口共用一个对账器）。

pub mod dispatch;
pub mod pull;
pub mod reconcile;

pub use dispatch::{DispatchReport, DispatchWorker};
pub use pull::{PullReport, PullWorker};
pub use reconcile::{ReconcileOutcome, ReportCandidate, Reconciler};
