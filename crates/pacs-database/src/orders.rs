//! 医院信息系统订单仓库

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use pacs_core::{HealthCheck, Order, PacsError, Result};
use sqlx::mysql::MySqlPool;
use sqlx::{FromRow, Row};
use tracing::{debug, warn};

use crate::models::DbOrderRow;

/// 订单仓库接口
///
/// 写回操作以申请单号为键，重复写入覆盖旧值。
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 指定申请日期的全部放射检查订单
    async fn pending_orders(&self, date: NaiveDate) -> Result<Vec<Order>>;

    /// 写回报告文本，返回是否有变化
    ///
    /// 文本与已存结果相同时不做修改，报告时间保持第一次写入的值。
    async fn save_result(&self, order_id: &str, text: &str, at: NaiveDateTime) -> Result<bool>;

    /// 申请单是否已有报告
    async fn has_result(&self, order_id: &str) -> Result<bool>;

    /// 写回影像浏览链接
    async fn save_viewer_link(&self, order_id: &str, link: &str) -> Result<()>;
}

const PENDING_ORDERS_SQL: &str = r#"
    SELECT
        pr.noorder AS noorder,
        p.no_rkm_medis AS no_rkm_medis,
        p.nm_pasien AS nm_pasien,
        p.tgl_lahir AS tgl_lahir,
        CAST(p.jk AS CHAR) AS jk,
        IFNULL(pj.kd_jenis_prw, '') AS kd_jenis_prw,
        IFNULL(jpr.nm_perawatan, '') AS nm_perawatan,
        pr.tgl_permintaan AS tgl_permintaan,
        pr.jam_permintaan AS jam_permintaan
    FROM permintaan_radiologi pr
    JOIN reg_periksa r ON pr.no_rawat = r.no_rawat
    JOIN pasien p ON r.no_rkm_medis = p.no_rkm_medis
    LEFT JOIN permintaan_pemeriksaan_radiologi pj ON pj.noorder = pr.noorder
    LEFT JOIN jns_perawatan_radiologi jpr ON pj.kd_jenis_prw = jpr.kd_jenis_prw
    WHERE pr.tgl_permintaan = ?
    ORDER BY pr.jam_permintaan, pr.noorder
"#;

/// MySQL 订单仓库（SIMRS Khanza 表结构）
#[derive(Debug, Clone)]
pub struct MySqlOrderRepository {
    pool: MySqlPool,
}

impl MySqlOrderRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl OrderRepository for MySqlOrderRepository {
    async fn pending_orders(&self, date: NaiveDate) -> Result<Vec<Order>> {
        let rows = sqlx::query(PENDING_ORDERS_SQL)
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PacsError::Database(e.to_string()))?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            // 单行解码失败只跳过该行
            match DbOrderRow::from_row(&row) {
                Ok(db_row) => orders.push(Order::from_request(db_row.into())),
                Err(e) => warn!("Skipping undecodable order row: {}", e),
            }
        }

        debug!("Fetched {} order rows for {}", orders.len(), date);
        Ok(orders)
    }

    async fn save_result(&self, order_id: &str, text: &str, at: NaiveDateTime) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PacsError::Database(e.to_string()))?;

        let row = sqlx::query(
            r#"
            SELECT no_rawat, tgl_permintaan, jam_permintaan, tgl_hasil
            FROM permintaan_radiologi
            WHERE noorder = ?
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| PacsError::Database(e.to_string()))?
        .ok_or_else(|| PacsError::NotFound(format!("申请单不存在: {}", order_id)))?;

        let no_rawat: String = row
            .try_get("no_rawat")
            .map_err(|e| PacsError::Database(e.to_string()))?;
        let tgl_permintaan: NaiveDate = row
            .try_get("tgl_permintaan")
            .map_err(|e| PacsError::Database(e.to_string()))?;
        let jam_permintaan: NaiveTime = row
            .try_get("jam_permintaan")
            .map_err(|e| PacsError::Database(e.to_string()))?;
        let tgl_hasil: Option<NaiveDate> = row
            .try_get("tgl_hasil")
            .map_err(|e| PacsError::Database(e.to_string()))?;

        let stored: Option<String> = sqlx::query_scalar(
            "SELECT hasil FROM hasil_radiologi WHERE no_rawat = ? AND tgl_periksa = ? AND jam = ?",
        )
        .bind(&no_rawat)
        .bind(tgl_permintaan)
        .bind(jam_permintaan)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| PacsError::Database(e.to_string()))?;

        if tgl_hasil.is_some() && stored.as_deref() == Some(text) {
            tx.commit()
                .await
                .map_err(|e| PacsError::Database(e.to_string()))?;
            debug!("Result for order {} unchanged", order_id);
            return Ok(false);
        }

        // 主键 (no_rawat, tgl_periksa, jam) 取自申请本身，重复写入只覆盖报告文本
        sqlx::query(
            r#"
            INSERT INTO hasil_radiologi (no_rawat, tgl_periksa, jam, hasil)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE hasil = VALUES(hasil)
            "#,
        )
        .bind(&no_rawat)
        .bind(tgl_permintaan)
        .bind(jam_permintaan)
        .bind(text)
        .execute(&mut *tx)
        .await
        .map_err(|e| PacsError::Database(e.to_string()))?;

        sqlx::query("UPDATE permintaan_radiologi SET tgl_hasil = ?, jam_hasil = ? WHERE noorder = ?")
            .bind(at.date())
            .bind(at.time())
            .bind(order_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PacsError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PacsError::Database(e.to_string()))?;

        debug!("Result stored for order {}", order_id);
        Ok(true)
    }

    async fn has_result(&self, order_id: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM permintaan_radiologi WHERE noorder = ? AND tgl_hasil IS NOT NULL",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PacsError::Database(e.to_string()))?;

        Ok(found.is_some())
    }

    async fn save_viewer_link(&self, order_id: &str, link: &str) -> Result<()> {
        // MySQL 对值未变化的行报告 0 行受影响，因此不据此判断订单是否存在
        sqlx::query("UPDATE permintaan_radiologi SET link_hasil = ? WHERE noorder = ?")
            .bind(link)
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PacsError::Database(e.to_string()))?;

        debug!("Viewer link stored for order {}", order_id);
        Ok(())
    }
}

#[async_trait]
impl HealthCheck for MySqlOrderRepository {
    fn name(&self) -> &str {
        "hospital_db"
    }

    async fn is_reachable(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
