//! HTTP处理器

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use pacs_core::{PacsError, StatusBoard, WorklistBoard};
use pacs_integration::ReportNotification;
use pacs_workflow::{ReconcileOutcome, ReportCandidate, Reconciler};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub status: StatusBoard,
    pub worklists: WorklistBoard,
    pub reconciler: Arc<Reconciler>,
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 四个外部依赖的最近一次可达性
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.status.current().await)
}

/// 最近一轮派发取到的订单
pub async fn get_worklists(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.worklists.current().await)
}

/// 归档推送的报告通知
///
/// 200 已对账，202 报告尚未就绪，400 请求体非法，502 归档不可达，500 两处写回都失败。
pub async fn receive_report(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let notification = ReportNotification::parse(&body).map_err(|e| {
        warn!("Rejected report notification: {}", e);
        e
    })?;
    info!(
        "Report notification for order {} ({:?})",
        notification.order_id, notification.hint
    );

    let candidate = ReportCandidate::from(notification);
    match state.reconciler.reconcile(&candidate).await? {
        ReconcileOutcome::NothingYet(reason) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "status": "pending", "reason": reason })),
        )
            .into_response()),
        outcome if outcome.is_applied() => Ok(Json(json!({ "status": "ok" })).into_response()),
        ReconcileOutcome::Applied { .. } => {
            error!("Report for order {} could not be stored anywhere", candidate.order_id);
            Err(PacsError::Internal(format!("无法保存申请单 {} 的报告", candidate.order_id)).into())
        }
    }
}

/// HTTP 错误响应
#[derive(Debug)]
pub struct ApiError(pub PacsError);

impl From<PacsError> for ApiError {
    fn from(error: PacsError) -> Self {
        ApiError(error)
    }
}

/// 错误处理
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PacsError::Validation(_) => StatusCode::BAD_REQUEST,
            PacsError::NotFound(_) => StatusCode::NOT_FOUND,
            PacsError::Transport(_) | PacsError::Archive(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": true,
            "message": self.0.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
