//! 数据库模型

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use pacs_core::models::*;
use sqlx::FromRow;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 医院库中一条放射检查申请（申请单 × 检查项目）
#[derive(Debug, Clone, FromRow)]
pub struct DbOrderRow {
    pub noorder: String,
    pub no_rkm_medis: String,
    pub nm_pasien: String,
    pub tgl_lahir: Option<NaiveDate>,
    pub jk: Option<String>, // L/P
    pub kd_jenis_prw: String,
    pub nm_perawatan: String,
    pub tgl_permintaan: NaiveDate,
    pub jam_permintaan: NaiveTime,
}

impl From<DbOrderRow> for OrderRequest {
    fn from(row: DbOrderRow) -> Self {
        OrderRequest {
            order_id: row.noorder.trim().to_string(),
            patient: PatientIdentity {
                medical_record_number: row.no_rkm_medis,
                name: row.nm_pasien,
                birth_date: row.tgl_lahir,
                sex: row
                    .jk
                    .as_deref()
                    .map(Sex::from_hospital_code)
                    .unwrap_or(Sex::Other),
            },
            procedure_code: row.kd_jenis_prw,
            procedure_description: row.nm_perawatan,
            scheduled_date: row.tgl_permintaan,
            scheduled_time: row.jam_permintaan,
        }
    }
}

/// 派发台账表
#[derive(Debug, Clone, FromRow)]
pub struct DbLedgerEntry {
    pub accession_number: String,
    pub order_id: String,
    pub payload: Option<String>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub result_received_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub viewer_link: Option<String>,
}

impl From<DbLedgerEntry> for DispatchLedgerEntry {
    fn from(db: DbLedgerEntry) -> Self {
        DispatchLedgerEntry {
            accession_number: db.accession_number,
            order_id: db.order_id,
            payload: db.payload,
            dispatched_at: db.dispatched_at,
            result_received_at: db.result_received_at,
            result: db.result,
            viewer_link: db.viewer_link,
        }
    }
}
