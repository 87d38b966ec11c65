//! 论文内容抽取 - 业务能力层
//!
//! 把外部解析工具输出的结构化 JSON 转成 [`PaperDocument`]：
//!
//! ```text
//! { "metadata": { "title": ..., "abstractText": ..., "sections": [ { "heading": ..., "text": ... } ] } }
//! ```
//!
//! 字段缺失是数据契约错误，不做恢复；字段为 `null` 时替换为 "N/A"。

use std::borrow::Cow;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{AppResult, ExtractionError, FileError};
use crate::models::{PaperDocument, NOT_AVAILABLE};

/// 结构化 JSON → 论文文档
#[derive(Debug, Clone, Copy, Default)]
pub struct PaperContentExtractor;

impl PaperContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 从已解析的 JSON 构建文档
    pub fn extract(&self, json: &Value) -> Result<PaperDocument, ExtractionError> {
        let metadata = required(as_object(json, "$")?, "metadata", "metadata")?;
        let metadata = as_object(metadata, "metadata")?;

        let title = leaf(metadata, "title", "metadata.title")?;
        let abstract_text = leaf(metadata, "abstractText", "metadata.abstractText")?;

        let sections = required(metadata, "sections", "metadata.sections")?
            .as_array()
            .ok_or_else(|| ExtractionError::invalid("metadata.sections", "array"))?;

        let mut pairs = Vec::with_capacity(sections.len());
        for (i, section) in sections.iter().enumerate() {
            let path = format!("metadata.sections[{}]", i);
            let section = as_object(section, &path)?;
            let heading = leaf(section, "heading", &format!("{}.heading", path))?;
            let text = leaf(section, "text", &format!("{}.text", path))?;
            pairs.push((heading, text));
        }

        debug!(sections = pairs.len(), "结构化 JSON 抽取完成");
        Ok(PaperDocument::new(title, abstract_text, pairs))
    }

    /// 从 JSON 原始字节构建文档
    ///
    /// 无法表示为 UTF-8 的内容直接丢弃，不报错：
    /// 无效字节，以及不成对的 `\uD800`-`\uDFFF` 转义（PDF 抽取文本里常见）。
    pub fn extract_bytes(&self, bytes: &[u8], source: &str) -> Result<PaperDocument, ExtractionError> {
        let text = drop_invalid_utf8(bytes);
        if text.len() != bytes.len() {
            debug!(
                source,
                dropped = bytes.len() - text.len(),
                "丢弃了无效的 UTF-8 字节"
            );
        }
        let text = match drop_lone_surrogates(&text) {
            Cow::Borrowed(_) => text,
            Cow::Owned(cleaned) => {
                debug!(source, "丢弃了不成对的代理项转义");
                cleaned
            }
        };
        let json: Value =
            serde_json::from_str(&text).map_err(|e| ExtractionError::InvalidJson {
                path: source.to_string(),
                source: e,
            })?;
        self.extract(&json)
    }

    /// 读取 JSON 文件并构建文档
    pub fn extract_file(&self, path: &Path) -> AppResult<PaperDocument> {
        let source_name = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| FileError::read(source_name.clone(), e))?;
        let document = self.extract_bytes(&bytes, &source_name)?;
        info!(
            "✓ 论文内容已抽取: {} ({} 个章节)",
            source_name,
            document.body_section_count()
        );
        Ok(document)
    }
}

fn as_object<'a>(value: &'a Value, field: &str) -> Result<&'a Map<String, Value>, ExtractionError> {
    value
        .as_object()
        .ok_or_else(|| ExtractionError::invalid(field, "object"))
}

fn required<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<&'a Value, ExtractionError> {
    object.get(key).ok_or_else(|| ExtractionError::missing(field))
}

/// 取字符串叶子字段；`null` 归一化为 "N/A"
fn leaf(object: &Map<String, Value>, key: &str, field: &str) -> Result<String, ExtractionError> {
    match required(object, key, field)? {
        Value::Null => Ok(NOT_AVAILABLE.to_string()),
        Value::String(s) => Ok(s.clone()),
        _ => Err(ExtractionError::invalid(field, "string or null")),
    }
}

fn drop_invalid_utf8(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

/// 删除不成对的 UTF-16 代理项转义，合法的高低代理对原样保留
///
/// 只识别真正的转义：`\\u` 中的反斜杠已被前一个反斜杠转义，不会当作 `\u` 处理。
fn drop_lone_surrogates(text: &str) -> Cow<'_, str> {
    if !text.contains("\\u") {
        return Cow::Borrowed(text);
    }

    let bytes = text.as_bytes();
    let mut out = String::new();
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        match unicode_escape(bytes, i) {
            Some(unit) if is_high_surrogate(unit) => {
                if unicode_escape(bytes, i + 6).is_some_and(is_low_surrogate) {
                    i += 12;
                } else {
                    out.push_str(&text[copied..i]);
                    i += 6;
                    copied = i;
                }
            }
            Some(unit) if is_low_surrogate(unit) => {
                out.push_str(&text[copied..i]);
                i += 6;
                copied = i;
            }
            Some(_) => i += 6,
            // 其它转义（含 `\\`）连同被转义字符一起跳过
            None => i += 2,
        }
    }

    if copied == 0 {
        return Cow::Borrowed(text);
    }
    out.push_str(&text[copied..]);
    Cow::Owned(out)
}

/// `bytes[at..]` 是 `\uXXXX` 时返回码元
fn unicode_escape(bytes: &[u8], at: usize) -> Option<u16> {
    let escape = bytes.get(at..at + 6)?;
    if escape[0] != b'\\' || escape[1] != b'u' || !escape[2..].iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let hex = std::str::from_utf8(&escape[2..]).ok()?;
    u16::from_str_radix(hex, 16).ok()
}

fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_fields_become_placeholder() {
        let input = json!({
            "metadata": {
                "title": "T",
                "abstractText": null,
                "sections": [{ "heading": "Intro", "text": "Body" }]
            }
        });
        let doc = PaperContentExtractor::new().extract(&input).unwrap();
        assert_eq!(doc.to_text(), "Title\nT\nAbstract\nN/A\nIntro\nBody");
    }

    #[test]
    fn test_null_section_leaves() {
        let input = json!({
            "metadata": {
                "title": null,
                "abstractText": "A",
                "sections": [
                    { "heading": null, "text": "first" },
                    { "heading": "Method", "text": null }
                ]
            }
        });
        let doc = PaperContentExtractor::new().extract(&input).unwrap();
        assert_eq!(
            doc.to_text(),
            "Title\nN/A\nAbstract\nA\nN/A\nfirst\nMethod\nN/A"
        );
        assert_eq!(doc.body_section_count(), 2);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let input = json!({
            "metadata": {
                "title": "T",
                "abstractText": "A",
                "sections": [{ "heading": "H", "text": "  padded  " }]
            }
        });
        let extractor = PaperContentExtractor::new();
        let first = extractor.extract(&input).unwrap();
        let second = extractor.extract(&input).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_text(), second.to_text());
    }

    #[test]
    fn test_missing_required_keys() {
        let extractor = PaperContentExtractor::new();
        let cases = [
            (json!({}), "metadata"),
            (
                json!({ "metadata": { "abstractText": "A", "sections": [] } }),
                "metadata.title",
            ),
            (
                json!({ "metadata": { "title": "T", "sections": [] } }),
                "metadata.abstractText",
            ),
            (
                json!({ "metadata": { "title": "T", "abstractText": "A" } }),
                "metadata.sections",
            ),
            (
                json!({ "metadata": { "title": "T", "abstractText": "A", "sections": [{ "text": "x" }] } }),
                "metadata.sections[0].heading",
            ),
        ];
        for (input, expected) in cases {
            match extractor.extract(&input) {
                Err(ExtractionError::MissingField { field }) => assert_eq!(field, expected),
                other => panic!("expected missing {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        let extractor = PaperContentExtractor::new();
        let err = extractor
            .extract(&json!({ "metadata": { "title": 3, "abstractText": "A", "sections": [] } }))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidField { ref field, .. } if field == "metadata.title"));

        let err = extractor
            .extract(&json!({ "metadata": { "title": "T", "abstractText": "A", "sections": {} } }))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidField { ref field, .. } if field == "metadata.sections"));
    }

    #[test]
    fn test_invalid_utf8_bytes_are_dropped() {
        let mut bytes =
            br#"{"metadata":{"title":"Caf"#.to_vec();
        bytes.push(0xFF);
        bytes.extend_from_slice(br#"e","abstractText":"A","sections":[]}}"#);
        let doc = PaperContentExtractor::new()
            .extract_bytes(&bytes, "inline")
            .unwrap();
        assert_eq!(doc.title(), "Cafe");
    }

    #[test]
    fn test_lone_surrogate_escapes_are_dropped() {
        let extractor = PaperContentExtractor::new();

        let doc = extractor
            .extract_bytes(
                br#"{"metadata":{"title":"Caf\ud800e","abstractText":"x\udc00y","sections":[]}}"#,
                "sp.json",
            )
            .unwrap();
        assert_eq!(doc.title(), "Cafe");
        assert_eq!(doc.to_text(), "Title\nCafe\nAbstract\nxy");

        let doc = extractor
            .extract_bytes(
                br#"{"metadata":{"title":"ok \ud83d\ude00","abstractText":"a\\ud800","sections":[{"heading":"\ud83d","text":"B"}]}}"#,
                "sp.json",
            )
            .unwrap();
        assert_eq!(doc.title(), "ok \u{1F600}");
        assert_eq!(doc.to_text(), "Title\nok \u{1F600}\nAbstract\na\\ud800\n\nB");
    }

    #[test]
    fn test_malformed_json_names_source() {
        let err = PaperContentExtractor::new()
            .extract_bytes(b"{not json", "paper.pdf.json")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidJson { ref path, .. } if path == "paper.pdf.json"));
    }

    #[test]
    fn test_extract_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.pdf.json");
        std::fs::write(
            &path,
            r#"{"metadata":{"title":"T","abstractText":"A","sections":[{"heading":"H","text":"B"}]}}"#,
        )
        .unwrap();
        let doc = PaperContentExtractor::new().extract_file(&path).unwrap();
        assert_eq!(doc.to_text(), "Title\nT\nAbstract\nA\nH\nB");

        let missing = PaperContentExtractor::new().extract_file(&dir.path().join("none.json"));
        assert!(missing.is_err());
    }
}
