//! 定时扫描归档中的报告

use pacs_core::{ArchiveStudy, PacsError, Result};
use pacs_integration::ReportHint;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::reconcile::{ReconcileOutcome, ReportCandidate, Reconciler};

/// 一轮扫描的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullReport {
    pub studies: usize,
    /// 台账中找不到对应派发的检查
    pub unmatched: usize,
    /// 两处都已有报告的检查
    pub up_to_date: usize,
    pub candidates: usize,
    pub reconciled: usize,
    pub pending: usize,
    pub failed: usize,
}

/// 检查在台账中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StudyState {
    /// 不是本服务派发的申请
    Unmatched,
    /// 医院库与台账都已写回
    UpToDate,
    /// 需要对账
    Open,
}

/// 扫描工作者
pub struct PullWorker {
    reconciler: Arc<Reconciler>,
    interval: Duration,
}

impl PullWorker {
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self { reconciler, interval }
    }

    pub async fn run(self) {
        info!("Report pull worker started (interval {:?})", self.interval);
        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;

            match self.run_cycle().await {
                Ok(report) => info!(
                    "Pull cycle done: studies={} unmatched={} up_to_date={} candidates={} reconciled={} pending={} failed={}",
                    report.studies,
                    report.unmatched,
                    report.up_to_date,
                    report.candidates,
                    report.reconciled,
                    report.pending,
                    report.failed
                ),
                Err(e) => error!("Pull cycle abandoned, cannot list studies: {}", e),
            }
        }
    }

    /// 执行一轮扫描；只有列出检查失败时才放弃整轮
    pub async fn run_cycle(&self) -> Result<PullReport> {
        let archive = self.reconciler.archive();
        let report_modality = self.reconciler.report_modality();

        let studies = archive.list_studies().await.map_err(PacsError::from)?;
        let mut report = PullReport {
            studies: studies.len(),
            ..PullReport::default()
        };

        for study in studies {
            let Some(order_id) = study.patient_id.clone() else {
                debug!("Study {} carries no order number, skipping", study.id);
                continue;
            };

            match self.study_state(&study, &order_id).await {
                StudyState::Unmatched => {
                    debug!("Study {} (order {}) was not dispatched by this bridge, skipping", study.id, order_id);
                    report.unmatched += 1;
                    continue;
                }
                StudyState::UpToDate => {
                    report.up_to_date += 1;
                    continue;
                }
                StudyState::Open => {}
            }

            let series = match archive.list_series(&study.id).await {
                Ok(series) => series,
                Err(outcome) if outcome.is_not_found_yet() => {
                    info!("Study {} vanished before listing series, skipping", study.id);
                    continue;
                }
                Err(outcome) => {
                    warn!("Cannot list series of study {}: {}", study.id, outcome);
                    report.failed += 1;
                    continue;
                }
            };

            let Some(report_series) = series.iter().find(|s| s.has_modality(report_modality)) else {
                info!("Study {} has no {} series, skipping", study.id, report_modality);
                continue;
            };

            report.candidates += 1;
            let candidate = ReportCandidate {
                order_id,
                accession_number: study.accession_number.clone(),
                hint: ReportHint {
                    study_id: Some(study.id.clone()),
                    series_id: Some(report_series.id.clone()),
                    instance_id: None,
                },
                study_instance_uid: study.study_instance_uid.clone(),
                viewer_link: None,
            };

            match self.reconciler.reconcile(&candidate).await {
                Ok(outcome) if outcome.is_applied() => report.reconciled += 1,
                Ok(ReconcileOutcome::NothingYet(_)) => report.pending += 1,
                Ok(_) => report.failed += 1,
                Err(e) => {
                    warn!("Reconciliation of study {} failed: {}", study.id, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// 依据台账和医院库判断检查是否还需要对账
    ///
    /// 台账查询失败时按需要对账处理，由对账本身的写入决定结果。
    async fn study_state(&self, study: &ArchiveStudy, order_id: &str) -> StudyState {
        let ledger = self.reconciler.ledger();

        let accession_number = match &study.accession_number {
            Some(accession_number) => accession_number.clone(),
            None => match ledger.accession_for_order(order_id).await {
                Ok(Some(accession_number)) => accession_number,
                Ok(None) => return StudyState::Unmatched,
                Err(e) => {
                    warn!("Ledger lookup failed for order {}: {}", order_id, e);
                    return StudyState::Open;
                }
            },
        };

        let entry = match ledger.entry(&accession_number).await {
            Ok(Some(entry)) if entry.order_id == order_id => entry,
            Ok(_) => return StudyState::Unmatched,
            Err(e) => {
                warn!("Ledger lookup failed for {}: {}", accession_number, e);
                return StudyState::Open;
            }
        };

        let link_missing = study.study_instance_uid.is_some() && entry.viewer_link.is_none();
        if entry.result.is_none() || link_missing {
            return StudyState::Open;
        }

        match self.reconciler.repository().has_result(order_id).await {
            Ok(true) => StudyState::UpToDate,
            Ok(false) => StudyState::Open,
            Err(e) => {
                warn!("Cannot check stored result of order {}: {}", order_id, e);
                StudyState::Open
            }
        }
    }
}
