//! 外部依赖可达性检查接口

use async_trait::async_trait;

/// 可被存活探针检查的外部依赖
///
/// 实现方自行处理错误，只返回可达/不可达；超时由探针统一施加。
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// 依赖名称（用于日志）
    fn name(&self) -> &str;

    /// 执行一次可达性检查
    async fn is_reachable(&self) -> bool;
}
