//! 报告内容解析链路
//!
//! 已知实例时直接取内容（一次请求）；否则按 study → series → instance → content
//! 逐级查找。任一级为空即返回 `NotFoundYet`，链路就此结束。

use pacs_core::{ReportContent, ResolutionOutcome};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archive::ArchiveClient;
use crate::sr::extract_report_text;

/// 定位报告所用的线索，越具体越靠后的查找步骤越少
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportHint {
    pub study_id: Option<String>,
    pub series_id: Option<String>,
    pub instance_id: Option<String>,
}

impl ReportHint {
    pub fn is_empty(&self) -> bool {
        self.study_id.is_none() && self.series_id.is_none() && self.instance_id.is_none()
    }
}

/// 解析报告文本
pub async fn resolve_report_content(
    archive: &dyn ArchiveClient,
    hint: &ReportHint,
    report_modality: &str,
) -> Result<ReportContent, ResolutionOutcome> {
    let instance_id = match &hint.instance_id {
        Some(instance_id) => instance_id.clone(),
        None => {
            let series_id = match &hint.series_id {
                Some(series_id) => series_id.clone(),
                None => find_report_series(archive, hint, report_modality).await?,
            };
            first_instance(archive, &series_id).await?
        }
    };

    let tags = archive.fetch_content(&instance_id).await?;
    let text = extract_report_text(&tags)?;

    Ok(ReportContent { instance_id, text })
}

async fn find_report_series(
    archive: &dyn ArchiveClient,
    hint: &ReportHint,
    report_modality: &str,
) -> Result<String, ResolutionOutcome> {
    let study_id = hint
        .study_id
        .as_deref()
        .ok_or_else(|| ResolutionOutcome::NotFoundYet("no study, series or instance identifier".to_string()))?;

    let series = archive.list_series(study_id).await?;
    debug!("Study {} has {} series", study_id, series.len());

    series
        .into_iter()
        .find(|s| s.has_modality(report_modality))
        .map(|s| s.id)
        .ok_or_else(|| {
            ResolutionOutcome::NotFoundYet(format!("study {} has no {} series", study_id, report_modality))
        })
}

async fn first_instance(archive: &dyn ArchiveClient, series_id: &str) -> Result<String, ResolutionOutcome> {
    archive
        .list_instances(series_id)
        .await?
        .into_iter()
        .next()
        .map(|i| i.id)
        .ok_or_else(|| ResolutionOutcome::NotFoundYet(format!("series {} has no instances", series_id)))
}
