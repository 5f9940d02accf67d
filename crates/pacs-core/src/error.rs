//! 错误定义模块

use thiserror::Error;

/// PACS桥接服务统一错误类型
#[derive(Error, Debug)]
pub enum PacsError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("影像归档错误: {0}")]
    Archive(String),

    #[error("网络传输错误: {0}")]
    Transport(String),

    #[error("DICOM处理错误: {0}")]
    Dicom(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// 报告解析链路（study → series → instance → content）中单步失败的分类
///
/// `NotFoundYet` 表示“本轮没有可对账的内容”，调用方不应把它当作故障上报。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    #[error("archive unreachable: {0}")]
    Transport(String),

    #[error("nothing to reconcile yet: {0}")]
    NotFoundYet(String),

    #[error("unexpected archive response: {0}")]
    ParseError(String),
}

impl ResolutionOutcome {
    pub fn is_not_found_yet(&self) -> bool {
        matches!(self, Self::NotFoundYet(_))
    }
}

impl From<ResolutionOutcome> for PacsError {
    fn from(outcome: ResolutionOutcome) -> Self {
        match outcome {
            ResolutionOutcome::Transport(msg) => PacsError::Transport(msg),
            ResolutionOutcome::NotFoundYet(msg) => PacsError::NotFound(msg),
            ResolutionOutcome::ParseError(msg) => PacsError::Archive(msg),
        }
    }
}

/// PACS桥接服务统一结果类型
pub type Result<T> = std::result::Result<T, PacsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_outcome_maps_to_pacs_error() {
        let err: PacsError = ResolutionOutcome::Transport("connection refused".into()).into();
        assert!(matches!(err, PacsError::Transport(_)));

        let err: PacsError = ResolutionOutcome::NotFoundYet("no SR series".into()).into();
        assert!(matches!(err, PacsError::NotFound(_)));

        let err: PacsError = ResolutionOutcome::ParseError("bad json".into()).into();
        assert!(matches!(err, PacsError::Archive(_)));
    }

    #[test]
    fn test_not_found_yet_is_distinguishable() {
        assert!(ResolutionOutcome::NotFoundYet("x".into()).is_not_found_yet());
        assert!(!ResolutionOutcome::Transport("x".into()).is_not_found_yet());
    }
}
