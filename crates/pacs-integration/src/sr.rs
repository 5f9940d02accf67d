//! 结构化报告 (SR) 文本提取
//!
//! 标签树路径: ContentSequence → 第一个条目 → TextValue → 字符串。
//! 同时兼容归档的两种 JSON 形态：以标签号为键（`"0040,a730"`，节点带 `Name`）
//! 和以关键字为键（`"ContentSequence"`）。

use pacs_core::ResolutionOutcome;
use serde_json::Value;

const CONTENT_SEQUENCE: (&str, &str) = ("ContentSequence", "0040,a730");
const TEXT_VALUE: (&str, &str) = ("TextValue", "0040,a160");

/// 提取报告文本
pub fn extract_report_text(tags: &Value) -> Result<String, ResolutionOutcome> {
    if !tags.is_object() {
        return Err(ResolutionOutcome::ParseError(
            "instance tags are not a JSON object".to_string(),
        ));
    }

    let sequence = find_node(tags, CONTENT_SEQUENCE)
        .ok_or_else(|| ResolutionOutcome::NotFoundYet("no ContentSequence in report".to_string()))?;

    let first_item = sequence_items(sequence)
        .and_then(|items| items.first())
        .ok_or_else(|| ResolutionOutcome::NotFoundYet("ContentSequence has no items".to_string()))?;

    let text_node = find_node(first_item, TEXT_VALUE)
        .ok_or_else(|| ResolutionOutcome::NotFoundYet("no TextValue in first content item".to_string()))?;

    match string_payload(text_node) {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(ResolutionOutcome::NotFoundYet("TextValue is empty".to_string())),
    }
}

fn find_node<'a>(node: &'a Value, (keyword, tag): (&str, &str)) -> Option<&'a Value> {
    let map = node.as_object()?;
    if let Some(found) = map.get(keyword) {
        return Some(found);
    }
    if let Some((_, found)) = map.iter().find(|(key, _)| key.eq_ignore_ascii_case(tag)) {
        return Some(found);
    }
    map.values()
        .find(|value| value.get("Name").and_then(Value::as_str) == Some(keyword))
}

fn sequence_items(node: &Value) -> Option<&Vec<Value>> {
    match node {
        Value::Array(items) => Some(items),
        Value::Object(_) => node.get("Value")?.as_array(),
        _ => None,
    }
}

/// 单个字符串或只含一个字符串的列表
fn string_payload(node: &Value) -> Option<String> {
    let value = match node {
        Value::Object(_) => node.get("Value")?,
        other => other,
    };
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Array(list) => list.first()?.as_str().map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::text_report_tags;
    use serde_json::json;

    #[test]
    fn test_extract_single_string() {
        let tags = json!({
            "ContentSequence": [
                { "TextValue": { "Value": "Normal findings." } }
            ]
        });
        assert_eq!(extract_report_text(&tags).unwrap(), "Normal findings.");
    }

    #[test]
    fn test_extract_list_of_one() {
        let tags = json!({
            "ContentSequence": [
                { "TextValue": { "Value": ["Normal findings."] } }
            ]
        });
        assert_eq!(extract_report_text(&tags).unwrap(), "Normal findings.");
    }

    #[test]
    fn test_extract_from_tag_keyed_form() {
        assert_eq!(
            extract_report_text(&text_report_tags("Tidak tampak kelainan.")).unwrap(),
            "Tidak tampak kelainan."
        );
    }

    #[test]
    fn test_missing_nodes_are_not_found_yet() {
        let no_sequence = json!({ "0010,0010": { "Name": "PatientName", "Value": "X" } });
        assert!(extract_report_text(&no_sequence).unwrap_err().is_not_found_yet());

        let empty_sequence = json!({ "ContentSequence": [] });
        assert!(extract_report_text(&empty_sequence).unwrap_err().is_not_found_yet());

        let no_text = json!({ "ContentSequence": [ { "ValueType": { "Value": "CONTAINER" } } ] });
        assert!(extract_report_text(&no_text).unwrap_err().is_not_found_yet());
    }

    #[test]
    fn test_non_object_is_parse_error() {
        let err = extract_report_text(&json!(["not", "tags"])).unwrap_err();
        assert!(matches!(err, ResolutionOutcome::ParseError(_)));
    }
}
