//! 供看板读取的状态快照
//!
//! 写入方每次整体替换快照，读取方拿到的总是完整的一份。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::Order;

/// 四个外部依赖的最近一次可达性
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub hospital_db: bool,
    pub ledger_db: bool,
    pub archive: bool,
    pub viewer: bool,
    pub checked_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub fn all_reachable(&self) -> bool {
        self.hospital_db && self.ledger_db && self.archive && self.viewer
    }
}

/// 状态快照看板
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以新快照整体替换旧快照
    pub async fn publish(&self, snapshot: StatusSnapshot) {
        *self.inner.write().await = snapshot;
    }

    pub async fn current(&self) -> StatusSnapshot {
        self.inner.read().await.clone()
    }
}

/// 工作列表看板中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorklistSummary {
    pub accession_number: String,
    pub patient_name: String,
    pub modality: String,
    pub scheduled_date: NaiveDate,
}

impl From<&Order> for WorklistSummary {
    fn from(order: &Order) -> Self {
        Self {
            accession_number: order.accession_number.clone(),
            patient_name: order.patient.name.clone(),
            modality: order.modality.to_string(),
            scheduled_date: order.scheduled_date,
        }
    }
}

/// 最近一轮派发所取到的待处理订单
#[derive(Debug, Clone, Default)]
pub struct WorklistBoard {
    inner: Arc<RwLock<Vec<WorklistSummary>>>,
}

impl WorklistBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, orders: &[Order]) {
        let rows = orders.iter().map(WorklistSummary::from).collect();
        *self.inner.write().await = rows;
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    pub async fn current(&self) -> Vec<WorklistSummary> {
        self.inner.read().await.clone()
    }
}
