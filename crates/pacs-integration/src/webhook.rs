//! 归档推送通知
//!
//! 归档在报告生成后 POST 一个 JSON 对象。`patient_id` 为申请单号（字符串或数字），
//! `study` / `series` / `orthanc_uuid` 至少要有一个，其余字段可选，未知字段忽略。

use pacs_core::{PacsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resolution::ReportHint;

#[derive(Debug, Deserialize)]
struct RawNotification {
    patient_id: Option<Value>,
    study: Option<String>,
    series: Option<String>,
    orthanc_uuid: Option<String>,
    accession: Option<String>,
    study_instance_uid: Option<String>,
    link: Option<String>,
    patient_name: Option<String>,
}

/// 校验通过的推送通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportNotification {
    pub order_id: String,
    pub hint: ReportHint,
    pub accession_number: Option<String>,
    pub study_instance_uid: Option<String>,
    pub link: Option<String>,
    pub patient_name: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ReportNotification {
    /// 解析并校验请求体
    pub fn parse(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| PacsError::Validation(format!("请求体不是合法JSON: {}", e)))?;
        if !value.is_object() {
            return Err(PacsError::Validation("请求体必须是JSON对象".to_string()));
        }

        let raw: RawNotification = serde_json::from_value(value)
            .map_err(|e| PacsError::Validation(format!("字段类型错误: {}", e)))?;

        let order_id = match raw.patient_id {
            Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(PacsError::Validation("缺少 patient_id".to_string())),
        };

        let hint = ReportHint {
            study_id: present(raw.study),
            series_id: present(raw.series),
            instance_id: present(raw.orthanc_uuid),
        };
        if hint.is_empty() {
            return Err(PacsError::Validation(
                "study、series、orthanc_uuid 至少需要一个".to_string(),
            ));
        }

        Ok(Self {
            order_id,
            hint,
            accession_number: present(raw.accession),
            study_instance_uid: present(raw.study_instance_uid),
            link: present(raw.link),
            patient_name: present(raw.patient_name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_patient_id_and_direct_instance() {
        let notification =
            ReportNotification::parse(br#"{"study":"S1","orthanc_uuid":"I1","patient_id":123}"#).unwrap();

        assert_eq!(notification.order_id, "123");
        assert_eq!(notification.hint.study_id.as_deref(), Some("S1"));
        assert_eq!(notification.hint.instance_id.as_deref(), Some("I1"));
        assert_eq!(notification.hint.series_id, None);
    }

    #[test]
    fn test_optional_fields_and_unknown_keys() {
        let notification = ReportNotification::parse(
            br#"{"patient_id":"PR1","series":"SE1","accession":"CTPR1","link":"","extra":{"a":1}}"#,
        )
        .unwrap();

        assert_eq!(notification.order_id, "PR1");
        assert_eq!(notification.accession_number.as_deref(), Some("CTPR1"));
        assert_eq!(notification.link, None);
    }

    #[test]
    fn test_rejects_invalid_payloads() {
        let cases: [&[u8]; 6] = [
            b"not json",
            b"[1,2,3]",
            br#"{"study":"S1"}"#,
            br#"{"patient_id":"  ","study":"S1"}"#,
            br#"{"patient_id":"1"}"#,
            br#"{"patient_id":"1","study":42}"#,
        ];
        for body in cases {
            assert!(matches!(
                ReportNotification::parse(body),
                Err(PacsError::Validation(_))
            ));
        }
    }
}
