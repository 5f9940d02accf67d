//! 内存实现
//!
//! 与数据库实现遵守相同的键语义（不存在才插入、按键覆盖），用于测试与本地调试。

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use pacs_core::{DispatchLedgerEntry, HealthCheck, Order, PacsError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::ledger::DispatchLedger;
use crate::orders::OrderRepository;

/// 写回的报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    pub text: String,
    pub at: NaiveDateTime,
}

/// 内存订单仓库
#[derive(Debug, Default)]
pub struct MemoryOrderRepository {
    orders: RwLock<Vec<Order>>,
    results: RwLock<HashMap<String, StoredResult>>,
    links: RwLock<HashMap<String, String>>,
    fail_fetch: AtomicBool,
    fail_writes: AtomicBool,
    result_writes: AtomicUsize,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: Vec<Order>) -> Self {
        Self {
            orders: RwLock::new(orders),
            ..Self::default()
        }
    }

    pub async fn set_orders(&self, orders: Vec<Order>) {
        *self.orders.write().await = orders;
    }

    /// 模拟医院库不可达（查询失败）
    pub fn set_fetch_failure(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// 模拟写回失败
    pub fn set_write_failure(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn result(&self, order_id: &str) -> Option<StoredResult> {
        self.results.read().await.get(order_id).cloned()
    }

    pub async fn viewer_link(&self, order_id: &str) -> Option<String> {
        self.links.read().await.get(order_id).cloned()
    }

    pub async fn result_count(&self) -> usize {
        self.results.read().await.len()
    }

    /// 实际写入报告的次数（文本变化的覆盖也计入）
    pub fn result_writes(&self) -> usize {
        self.result_writes.load(Ordering::SeqCst)
    }

    async fn ensure_known(&self, order_id: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PacsError::Database("hospital database unavailable".to_string()));
        }
        let known = self.orders.read().await.iter().any(|o| o.order_id == order_id);
        if known {
            Ok(())
        } else {
            Err(PacsError::NotFound(format!("申请单不存在: {}", order_id)))
        }
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn pending_orders(&self, date: NaiveDate) -> Result<Vec<Order>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(PacsError::Database("hospital database unavailable".to_string()));
        }
        Ok(self
            .orders
            .read()
            .await
            .iter()
            .filter(|o| o.scheduled_date == date)
            .cloned()
            .collect())
    }

    async fn save_result(&self, order_id: &str, text: &str, at: NaiveDateTime) -> Result<bool> {
        self.ensure_known(order_id).await?;
        let mut results = self.results.write().await;
        if results.get(order_id).is_some_and(|r| r.text == text) {
            return Ok(false);
        }
        results.insert(
            order_id.to_string(),
            StoredResult {
                text: text.to_string(),
                at,
            },
        );
        self.result_writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn has_result(&self, order_id: &str) -> Result<bool> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(PacsError::Database("hospital database unavailable".to_string()));
        }
        Ok(self.results.read().await.contains_key(order_id))
    }

    async fn save_viewer_link(&self, order_id: &str, link: &str) -> Result<()> {
        self.ensure_known(order_id).await?;
        self.links
            .write()
            .await
            .insert(order_id.to_string(), link.to_string());
        Ok(())
    }
}

#[async_trait]
impl HealthCheck for MemoryOrderRepository {
    fn name(&self) -> &str {
        "hospital_db"
    }

    async fn is_reachable(&self) -> bool {
        !self.fail_fetch.load(Ordering::SeqCst)
    }
}

/// 内存派发台账
#[derive(Debug, Default)]
pub struct MemoryDispatchLedger {
    entries: RwLock<HashMap<String, DispatchLedgerEntry>>,
    unavailable: AtomicBool,
}

impl MemoryDispatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟台账库不可达
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(PacsError::Database("ledger database unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DispatchLedger for MemoryDispatchLedger {
    async fn is_dispatched(&self, accession_number: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self
            .entries
            .read()
            .await
            .get(accession_number)
            .is_some_and(|e| e.dispatched_at.is_some()))
    }

    async fn record_dispatch(&self, accession_number: &str, order_id: &str, payload: &str) -> Result<bool> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(accession_number.to_string())
            .or_insert_with(|| DispatchLedgerEntry {
                accession_number: accession_number.to_string(),
                order_id: order_id.to_string(),
                payload: None,
                dispatched_at: None,
                result_received_at: None,
                result: None,
                viewer_link: None,
            });

        if entry.dispatched_at.is_some() {
            return Ok(false);
        }
        entry.payload = Some(payload.to_string());
        entry.dispatched_at = Some(Utc::now());
        Ok(true)
    }

    async fn record_result(
        &self,
        accession_number: &str,
        order_id: &str,
        result: &str,
        viewer_link: Option<&str>,
    ) -> Result<()> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(accession_number.to_string())
            .or_insert_with(|| DispatchLedgerEntry {
                accession_number: accession_number.to_string(),
                order_id: order_id.to_string(),
                payload: None,
                dispatched_at: None,
                result_received_at: None,
                result: None,
                viewer_link: None,
            });

        if entry.result.as_deref() != Some(result) || entry.result_received_at.is_none() {
            entry.result_received_at = Some(Utc::now());
        }
        entry.result = Some(result.to_string());
        if let Some(link) = viewer_link {
            entry.viewer_link = Some(link.to_string());
        }
        Ok(())
    }

    async fn accession_for_order(&self, order_id: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.order_id == order_id)
            .max_by_key(|e| e.dispatched_at)
            .map(|e| e.accession_number.clone()))
    }

    async fn entry(&self, accession_number: &str) -> Result<Option<DispatchLedgerEntry>> {
        self.check_available()?;
        Ok(self.entries.read().await.get(accession_number).cloned())
    }
}

#[async_trait]
impl HealthCheck for MemoryDispatchLedger {
    fn name(&self) -> &str {
        "ledger_db"
    }

    async fn is_reachable(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }
}
