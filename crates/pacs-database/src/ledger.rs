//! 派发台账
//!
//! 每个检查号至多一行，唯一约束是整个桥接服务唯一的幂等边界。

use async_trait::async_trait;
use pacs_core::{DispatchLedgerEntry, HealthCheck, PacsError, Result};
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{debug, info};

use crate::models::DbLedgerEntry;

/// 派发台账接口
#[async_trait]
pub trait DispatchLedger: Send + Sync {
    /// 检查号是否已成功派发
    async fn is_dispatched(&self, accession_number: &str) -> Result<bool>;

    /// 记录一次成功派发；已存在时不做任何修改，返回是否新写入
    async fn record_dispatch(&self, accession_number: &str, order_id: &str, payload: &str) -> Result<bool>;

    /// 写入（或覆盖）报告结果；文本未变时保留首次收到的时间
    async fn record_result(
        &self,
        accession_number: &str,
        order_id: &str,
        result: &str,
        viewer_link: Option<&str>,
    ) -> Result<()>;

    /// 申请单最近一次派发使用的检查号
    async fn accession_for_order(&self, order_id: &str) -> Result<Option<String>>;

    async fn entry(&self, accession_number: &str) -> Result<Option<DispatchLedgerEntry>>;
}

/// PostgreSQL 派发台账
#[derive(Debug, Clone)]
pub struct PgDispatchLedger {
    pool: PgPool,
}

impl PgDispatchLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 创建台账表
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dispatch_ledger (
                accession_number VARCHAR(64) PRIMARY KEY,
                order_id VARCHAR(64) NOT NULL,
                payload TEXT,
                dispatched_at TIMESTAMP WITH TIME ZONE,
                result_received_at TIMESTAMP WITH TIME ZONE,
                result TEXT,
                viewer_link TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PacsError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_dispatch_ledger_order_id ON dispatch_ledger(order_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| PacsError::Database(e.to_string()))?;

        info!("Dispatch ledger table ready");
        Ok(())
    }
}

#[async_trait]
impl DispatchLedger for PgDispatchLedger {
    async fn is_dispatched(&self, accession_number: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM dispatch_ledger WHERE accession_number = $1 AND dispatched_at IS NOT NULL) AS found",
        )
        .bind(accession_number)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PacsError::Database(e.to_string()))?;

        row.try_get("found")
            .map_err(|e| PacsError::Database(e.to_string()))
    }

    async fn record_dispatch(&self, accession_number: &str, order_id: &str, payload: &str) -> Result<bool> {
        // 先到的报告结果可能已建行（dispatched_at 为空），此时补写派发信息
        let outcome = sqlx::query(
            r#"
            INSERT INTO dispatch_ledger (accession_number, order_id, payload, dispatched_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (accession_number) DO UPDATE
                SET payload = EXCLUDED.payload, dispatched_at = EXCLUDED.dispatched_at
                WHERE dispatch_ledger.dispatched_at IS NULL
            "#,
        )
        .bind(accession_number)
        .bind(order_id)
        .bind(payload)
        .execute(&self.pool)
        .await;

        match outcome {
            Ok(done) => Ok(done.rows_affected() == 1),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                debug!("Accession {} already recorded by a concurrent writer", accession_number);
                Ok(false)
            }
            Err(e) => Err(PacsError::Database(e.to_string())),
        }
    }

    async fn record_result(
        &self,
        accession_number: &str,
        order_id: &str,
        result: &str,
        viewer_link: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dispatch_ledger (accession_number, order_id, result, viewer_link, result_received_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (accession_number) DO UPDATE
                SET result = EXCLUDED.result,
                    viewer_link = COALESCE(EXCLUDED.viewer_link, dispatch_ledger.viewer_link),
                    result_received_at = CASE
                        WHEN dispatch_ledger.result IS DISTINCT FROM EXCLUDED.result
                            OR dispatch_ledger.result_received_at IS NULL
                        THEN EXCLUDED.result_received_at
                        ELSE dispatch_ledger.result_received_at
                    END
            "#,
        )
        .bind(accession_number)
        .bind(order_id)
        .bind(result)
        .bind(viewer_link)
        .execute(&self.pool)
        .await
        .map_err(|e| PacsError::Database(e.to_string()))?;

        debug!("Ledger result stored for {}", accession_number);
        Ok(())
    }

    async fn accession_for_order(&self, order_id: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT accession_number FROM dispatch_ledger WHERE order_id = $1 ORDER BY dispatched_at DESC NULLS LAST LIMIT 1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PacsError::Database(e.to_string()))?;

        row.map(|r| r.try_get("accession_number"))
            .transpose()
            .map_err(|e| PacsError::Database(e.to_string()))
    }

    async fn entry(&self, accession_number: &str) -> Result<Option<DispatchLedgerEntry>> {
        let result = sqlx::query_as::<_, DbLedgerEntry>(
            "SELECT * FROM dispatch_ledger WHERE accession_number = $1",
        )
        .bind(accession_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PacsError::Database(e.to_string()))?;

        Ok(result.map(DispatchLedgerEntry::from))
    }
}

#[async_trait]
impl HealthCheck for PgDispatchLedger {
    fn name(&self) -> &str {
        "ledger_db"
    }

    async fn is_reachable(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
