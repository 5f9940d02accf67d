//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::modality::{self, Modality};
use crate::utils;

/// 性别枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    /// 医院系统中的性别代码（L=男, P=女）
    pub fn from_hospital_code(code: &str) -> Self {
        match code.trim() {
            "L" => Sex::Male,
            "P" => Sex::Female,
            _ => Sex::Other,
        }
    }

    /// DICOM (0010,0040) 取值
    pub fn dicom_code(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Other => "O",
        }
    }
}

/// 患者身份信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientIdentity {
    pub medical_record_number: String, // 病历号
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub sex: Sex,
}

/// 医院系统中尚未分类的检查申请行
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub order_id: String, // 申请单号
    pub patient: PatientIdentity,
    pub procedure_code: String,
    pub procedure_description: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
}

/// 一次预约检查（已分类、已分配检查号）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub accession_number: String,
    pub patient: PatientIdentity,
    pub procedure_code: String,
    pub procedure_description: String,
    pub scheduled_step_id: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub modality: Modality,
}

impl Order {
    /// 对申请行进行设备分类并生成检查号
    pub fn from_request(request: OrderRequest) -> Self {
        let modality = modality::classify(&request.procedure_description);
        let accession_number = utils::accession_number(
            modality,
            &request.order_id,
            request.scheduled_date,
            request.scheduled_time,
        );
        let scheduled_step_id = utils::scheduled_step_id(
            &request.order_id,
            request.scheduled_date,
            request.scheduled_time,
        );

        Self {
            order_id: request.order_id,
            accession_number,
            patient: request.patient,
            procedure_code: request.procedure_code,
            procedure_description: request.procedure_description,
            scheduled_step_id,
            scheduled_date: request.scheduled_date,
            scheduled_time: request.scheduled_time,
            modality,
        }
    }
}

/// 派发台账记录，每个检查号至多一条
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchLedgerEntry {
    pub accession_number: String,
    pub order_id: String,
    pub payload: Option<String>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub result_received_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub viewer_link: Option<String>,
}

/// 归档中的检查
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveStudy {
    pub id: String,
    pub study_instance_uid: Option<String>,
    pub accession_number: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
}

/// 归档中的序列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSeries {
    pub id: String,
    pub modality: Option<String>,
}

impl ArchiveSeries {
    pub fn has_modality(&self, modality: &str) -> bool {
        self.modality
            .as_deref()
            .is_some_and(|m| m.trim().eq_ignore_ascii_case(modality))
    }
}

/// 归档中的实例
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveInstance {
    pub id: String,
}

/// 从结构化报告实例中提取出的文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportContent {
    pub instance_id: String,
    pub text: String,
}
