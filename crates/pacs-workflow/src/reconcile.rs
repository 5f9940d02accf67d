//! 报告对账
//!
//! 推送通知与定时扫描各自产出 [`ReportCandidate`]，由同一个 [`Reconciler`] 处理：
//! 解析出报告文本后，分别写回医院库（按申请单号）和派发台账（按检查号）。
//! 两处写入互不依赖，任一失败只记日志，另一处照常尝试；两者都是按键覆盖，可安全重做。

use chrono::Local;
use pacs_core::{PacsError, Result};
use pacs_database::{DispatchLedger, OrderRepository};
use pacs_integration::{resolve_report_content, ArchiveClient, ReportHint, ReportNotification, ViewerLinks};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 待对账的报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportCandidate {
    pub order_id: String,
    pub accession_number: Option<String>,
    pub hint: ReportHint,
    pub study_instance_uid: Option<String>,
    pub viewer_link: Option<String>,
}

impl From<ReportNotification> for ReportCandidate {
    fn from(notification: ReportNotification) -> Self {
        ReportCandidate {
            order_id: notification.order_id,
            accession_number: notification.accession_number,
            hint: notification.hint,
            study_instance_uid: notification.study_instance_uid,
            viewer_link: notification.link,
        }
    }
}

/// 对账结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// 归档中还没有可对账的报告
    NothingYet(String),
    /// 已取得报告文本并尝试了两处写回
    Applied {
        repository_written: bool,
        ledger_written: bool,
    },
}

impl ReconcileOutcome {
    /// 至少一处写回成功
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Applied { repository_written, ledger_written }
                if *repository_written || *ledger_written
        )
    }
}

/// 对账器
pub struct Reconciler {
    repository: Arc<dyn OrderRepository>,
    ledger: Arc<dyn DispatchLedger>,
    archive: Arc<dyn ArchiveClient>,
    viewer: ViewerLinks,
    report_modality: String,
}

impl Reconciler {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        ledger: Arc<dyn DispatchLedger>,
        archive: Arc<dyn ArchiveClient>,
        viewer: ViewerLinks,
        report_modality: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            ledger,
            archive,
            viewer,
            report_modality: report_modality.into(),
        }
    }

    pub fn archive(&self) -> &Arc<dyn ArchiveClient> {
        &self.archive
    }

    pub fn repository(&self) -> &Arc<dyn OrderRepository> {
        &self.repository
    }

    pub fn ledger(&self) -> &Arc<dyn DispatchLedger> {
        &self.ledger
    }

    pub fn report_modality(&self) -> &str {
        &self.report_modality
    }

    /// 对一个候选报告执行对账
    ///
    /// 归档传输失败或响应无法解析时返回错误；报告尚不存在时返回 `NothingYet`，不写任何数据。
    pub async fn reconcile(&self, candidate: &ReportCandidate) -> Result<ReconcileOutcome> {
        let content =
            match resolve_report_content(self.archive.as_ref(), &candidate.hint, &self.report_modality).await {
                Ok(content) => content,
                Err(outcome) if outcome.is_not_found_yet() => {
                    info!("No report for order {} yet: {}", candidate.order_id, outcome);
                    return Ok(ReconcileOutcome::NothingYet(outcome.to_string()));
                }
                Err(outcome) => return Err(PacsError::from(outcome)),
            };

        let link = candidate.viewer_link.clone().or_else(|| {
            candidate
                .study_instance_uid
                .as_deref()
                .map(|uid| self.viewer.study_link(uid))
        });

        let repository_written = self
            .write_repository(&candidate.order_id, &content.text, link.as_deref())
            .await;
        let ledger_written = self
            .write_ledger(candidate, &content.text, link.as_deref())
            .await;

        info!(
            "Report {} reconciled for order {} (repository={}, ledger={})",
            content.instance_id, candidate.order_id, repository_written, ledger_written
        );

        Ok(ReconcileOutcome::Applied {
            repository_written,
            ledger_written,
        })
    }

    async fn write_repository(&self, order_id: &str, text: &str, link: Option<&str>) -> bool {
        let at = Local::now().naive_local();
        match self.repository.save_result(order_id, text, at).await {
            Ok(true) => {}
            Ok(false) => debug!("Result for order {} already up to date", order_id),
            Err(e) => {
                warn!("Failed to store result for order {}: {}", order_id, e);
                return false;
            }
        }

        if let Some(link) = link {
            if let Err(e) = self.repository.save_viewer_link(order_id, link).await {
                warn!("Failed to store viewer link for order {}: {}", order_id, e);
                return false;
            }
        }
        true
    }

    async fn write_ledger(&self, candidate: &ReportCandidate, text: &str, link: Option<&str>) -> bool {
        let accession_number = match &candidate.accession_number {
            Some(accession_number) => accession_number.clone(),
            None => match self.ledger.accession_for_order(&candidate.order_id).await {
                Ok(Some(accession_number)) => accession_number,
                Ok(None) => {
                    warn!(
                        "No accession known for order {}, ledger copy skipped",
                        candidate.order_id
                    );
                    return false;
                }
                Err(e) => {
                    warn!("Ledger lookup failed for order {}: {}", candidate.order_id, e);
                    return false;
                }
            },
        };

        match self
            .ledger
            .record_result(&accession_number, &candidate.order_id, text, link)
            .await
        {
            Ok(()) => {
                debug!("Ledger result stored for {}", accession_number);
                true
            }
            Err(e) => {
                warn!("Failed to store ledger result for {}: {}", accession_number, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use pacs_core::{Order, OrderRequest, PatientIdentity, Sex};
    use pacs_database::{MemoryDispatchLedger, MemoryOrderRepository};
    use pacs_integration::InMemoryArchive;

    fn order(order_id: &str) -> Order {
        Order::from_request(OrderRequest {
            order_id: order_id.to_string(),
            patient: PatientIdentity {
                medical_record_number: "000123".to_string(),
                name: "BUDI SANTOSO".to_string(),
                birth_date: None,
                sex: Sex::Male,
            },
            procedure_code: "RAD001".to_string(),
            procedure_description: "CT SCAN KEPALA".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        })
    }

    struct Fixture {
        repository: Arc<MemoryOrderRepository>,
        ledger: Arc<MemoryDispatchLedger>,
        archive: Arc<InMemoryArchive>,
        reconciler: Reconciler,
    }

    async fn fixture() -> Fixture {
        let order = order("123");
        let repository = Arc::new(MemoryOrderRepository::with_orders(vec![order.clone()]));
        let ledger = Arc::new(MemoryDispatchLedger::new());
        ledger
            .record_dispatch(&order.accession_number, &order.order_id, "{}")
            .await
            .unwrap();
        let archive = Arc::new(InMemoryArchive::new());
        archive.add_report("S1", "SR1", "I1", "Normal findings.").await;

        let reconciler = Reconciler::new(
            repository.clone(),
            ledger.clone(),
            archive.clone(),
            ViewerLinks::new("http://ohif.local"),
            "SR",
        );
        Fixture {
            repository,
            ledger,
            archive,
            reconciler,
        }
    }

    fn push(body: &str) -> ReportCandidate {
        ReportNotification::parse(body.as_bytes()).unwrap().into()
    }

    #[tokio::test]
    async fn test_push_with_instance_resolves_directly() {
        let f = fixture().await;
        let candidate = push(r#"{"study":"S1","orthanc_uuid":"I1","patient_id":123}"#);

        let outcome = f.reconciler.reconcile(&candidate).await.unwrap();
        assert!(outcome.is_applied());
        assert_eq!(f.archive.list_series_calls(), 0);
        assert_eq!(f.archive.list_instances_calls(), 0);

        let stored = f.repository.result("123").await.unwrap();
        assert_eq!(stored.text, "Normal findings.");

        let accession = order("123").accession_number;
        let entry = f.ledger.entry(&accession).await.unwrap().unwrap();
        assert_eq!(entry.result.as_deref(), Some("Normal findings."));
    }

    #[tokio::test]
    async fn test_duplicate_notification_is_idempotent() {
        let f = fixture().await;
        let candidate = push(r#"{"study":"S1","orthanc_uuid":"I1","patient_id":123}"#);

        f.reconciler.reconcile(&candidate).await.unwrap();
        let first = f.repository.result("123").await.unwrap();
        let first_entry = f.ledger.entry(&order("123").accession_number).await.unwrap().unwrap();

        f.reconciler.reconcile(&candidate).await.unwrap();
        let second = f.repository.result("123").await.unwrap();
        let second_entry = f.ledger.entry(&order("123").accession_number).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(f.repository.result_writes(), 1);
        assert_eq!(first_entry.result_received_at, second_entry.result_received_at);
        assert_eq!(f.repository.result_count().await, 1);
        assert_eq!(f.ledger.len().await, 1);
        assert_eq!(first_entry.result, second_entry.result);
        assert_eq!(first_entry.payload, second_entry.payload);
    }

    #[tokio::test]
    async fn test_study_without_report_writes_nothing() {
        let f = fixture().await;
        let candidate = ReportCandidate {
            order_id: "123".to_string(),
            accession_number: None,
            hint: ReportHint {
                study_id: Some("EMPTY".to_string()),
                ..ReportHint::default()
            },
            study_instance_uid: None,
            viewer_link: None,
        };
        f.archive
            .add_study(pacs_core::ArchiveStudy {
                id: "EMPTY".to_string(),
                study_instance_uid: None,
                accession_number: None,
                patient_id: Some("123".to_string()),
                patient_name: None,
            })
            .await;

        let outcome = f.reconciler.reconcile(&candidate).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::NothingYet(_)));
        assert_eq!(f.repository.result_writes(), 0);
        let entry = f.ledger.entry(&order("123").accession_number).await.unwrap().unwrap();
        assert_eq!(entry.result, None);
    }

    #[tokio::test]
    async fn test_repository_failure_still_writes_ledger() {
        let f = fixture().await;
        f.repository.set_write_failure(true);
        let candidate = push(r#"{"study":"S1","orthanc_uuid":"I1","patient_id":"123","study_instance_uid":"1.2.3"}"#);

        let outcome = f.reconciler.reconcile(&candidate).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Applied {
                repository_written: false,
                ledger_written: true
            }
        );
        let entry = f.ledger.entry(&order("123").accession_number).await.unwrap().unwrap();
        assert_eq!(entry.viewer_link.as_deref(), Some("http://ohif.local/viewer?studyUID=1.2.3"));

        // 医院库恢复后重做即可补齐
        f.repository.set_write_failure(false);
        f.reconciler.reconcile(&candidate).await.unwrap();
        assert_eq!(f.repository.result("123").await.unwrap().text, "Normal findings.");
        assert_eq!(
            f.repository.viewer_link("123").await.as_deref(),
            Some("http://ohif.local/viewer?studyUID=1.2.3")
        );
    }

    #[tokio::test]
    async fn test_archive_transport_failure_is_error() {
        let f = fixture().await;
        f.archive.set_unreachable(true);
        let candidate = push(r#"{"study":"S1","orthanc_uuid":"I1","patient_id":123}"#);

        assert!(matches!(
            f.reconciler.reconcile(&candidate).await,
            Err(PacsError::Transport(_))
        ));
        assert!(f.repository.result("123").await.is_none());
    }
}
