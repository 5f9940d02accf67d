//! 影像归档客户端接口

use async_trait::async_trait;
use pacs_core::{ArchiveInstance, ArchiveSeries, ArchiveStudy, Order, ResolutionOutcome};

/// 影像归档客户端
///
/// `send` 把订单投递到归档的工作列表入口，失败直接返回，不在调用内重试。
/// 查询接口只读，每一步的失败都按 [`ResolutionOutcome`] 分类。
#[async_trait]
pub trait ArchiveClient: Send + Sync {
    /// 投递工作列表；同一检查号重复投递覆盖同一条记录
    async fn send(&self, order: &Order) -> pacs_core::Result<()>;

    async fn list_studies(&self) -> Result<Vec<ArchiveStudy>, ResolutionOutcome>;

    async fn list_series(&self, study_id: &str) -> Result<Vec<ArchiveSeries>, ResolutionOutcome>;

    async fn list_instances(&self, series_id: &str) -> Result<Vec<ArchiveInstance>, ResolutionOutcome>;

    /// 实例的标签树（JSON）
    async fn fetch_content(&self, instance_id: &str) -> Result<serde_json::Value, ResolutionOutcome>;
}
