//! 内存影像归档
//!
//! 实现 [`ArchiveClient`]，记录投递的订单并统计每类查询的调用次数。

use async_trait::async_trait;
use pacs_core::{
    ArchiveInstance, ArchiveSeries, ArchiveStudy, HealthCheck, Order, PacsError, ResolutionOutcome,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::archive::ArchiveClient;

/// 组装一份只含一段文本的报告标签树（以标签号为键的形态）
pub fn text_report_tags(text: &str) -> Value {
    serde_json::json!({
        "0008,0060": { "Name": "Modality", "Type": "String", "Value": "SR" },
        "0040,a730": {
            "Name": "ContentSequence",
            "Type": "Sequence",
            "Value": [
                {
                    "0040,a040": { "Name": "ValueType", "Type": "String", "Value": "TEXT" },
                    "0040,a160": { "Name": "TextValue", "Type": "String", "Value": text }
                }
            ]
        }
    })
}

#[derive(Debug, Default)]
pub struct InMemoryArchive {
    // 以检查号为键，重复投递覆盖
    worklists: RwLock<HashMap<String, Order>>,
    studies: RwLock<Vec<ArchiveStudy>>,
    series: RwLock<HashMap<String, Vec<ArchiveSeries>>>,
    instances: RwLock<HashMap<String, Vec<ArchiveInstance>>>,
    contents: RwLock<HashMap<String, Value>>,
    fail_send: AtomicBool,
    unreachable: AtomicBool,
    send_calls: AtomicUsize,
    list_series_calls: AtomicUsize,
    list_instances_calls: AtomicUsize,
    fetch_content_calls: AtomicUsize,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_study(&self, study: ArchiveStudy) {
        self.series.write().await.entry(study.id.clone()).or_default();
        self.studies.write().await.push(study);
    }

    pub async fn add_series(&self, study_id: &str, series: ArchiveSeries) {
        self.instances.write().await.entry(series.id.clone()).or_default();
        self.series
            .write()
            .await
            .entry(study_id.to_string())
            .or_default()
            .push(series);
    }

    pub async fn add_instance(&self, series_id: &str, instance_id: &str, content: Value) {
        self.instances
            .write()
            .await
            .entry(series_id.to_string())
            .or_default()
            .push(ArchiveInstance {
                id: instance_id.to_string(),
            });
        self.contents
            .write()
            .await
            .insert(instance_id.to_string(), content);
    }

    /// 在检查下挂一个 SR 序列及一份文本报告
    pub async fn add_report(&self, study_id: &str, series_id: &str, instance_id: &str, text: &str) {
        self.add_series(
            study_id,
            ArchiveSeries {
                id: series_id.to_string(),
                modality: Some("SR".to_string()),
            },
        )
        .await;
        self.add_instance(series_id, instance_id, text_report_tags(text))
            .await;
    }

    /// 投递失败（模拟工作列表目录不可写）
    pub fn set_send_failure(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    /// 查询全部以传输错误失败
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub async fn worklist(&self, accession_number: &str) -> Option<Order> {
        self.worklists.read().await.get(accession_number).cloned()
    }

    pub async fn worklist_count(&self) -> usize {
        self.worklists.read().await.len()
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn list_series_calls(&self) -> usize {
        self.list_series_calls.load(Ordering::SeqCst)
    }

    pub fn list_instances_calls(&self) -> usize {
        self.list_instances_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_content_calls(&self) -> usize {
        self.fetch_content_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<(), ResolutionOutcome> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(ResolutionOutcome::Transport("archive unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ArchiveClient for InMemoryArchive {
    async fn send(&self, order: &Order) -> pacs_core::Result<()> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(PacsError::Archive(format!(
                "无法投递工作列表: {}",
                order.accession_number
            )));
        }
        self.worklists
            .write()
            .await
            .insert(order.accession_number.clone(), order.clone());
        Ok(())
    }

    async fn list_studies(&self) -> Result<Vec<ArchiveStudy>, ResolutionOutcome> {
        self.check_reachable()?;
        Ok(self.studies.read().await.clone())
    }

    async fn list_series(&self, study_id: &str) -> Result<Vec<ArchiveSeries>, ResolutionOutcome> {
        self.list_series_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.series
            .read()
            .await
            .get(study_id)
            .cloned()
            .ok_or_else(|| ResolutionOutcome::NotFoundYet(format!("unknown study {}", study_id)))
    }

    async fn list_instances(&self, series_id: &str) -> Result<Vec<ArchiveInstance>, ResolutionOutcome> {
        self.list_instances_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.instances
            .read()
            .await
            .get(series_id)
            .cloned()
            .ok_or_else(|| ResolutionOutcome::NotFoundYet(format!("unknown series {}", series_id)))
    }

    async fn fetch_content(&self, instance_id: &str) -> Result<Value, ResolutionOutcome> {
        self.fetch_content_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.contents
            .read()
            .await
            .get(instance_id)
            .cloned()
            .ok_or_else(|| ResolutionOutcome::NotFoundYet(format!("unknown instance {}", instance_id)))
    }
}

#[async_trait]
impl HealthCheck for InMemoryArchive {
    fn name(&self) -> &str {
        "archive"
    }

    async fn is_reachable(&self) -> bool {
        !self.unreachable.load(Ordering::SeqCst)
    }
}
