//! 论文文档模型
//!
//! 一篇论文被表示为有序的 (标题, 正文) 序列，
//! 前两项固定为 ("Title", 标题) 和 ("Abstract", 摘要)。

use serde::Serialize;

/// 缺失字段的占位值
pub const NOT_AVAILABLE: &str = "N/A";

/// 扁平化之后的论文文档
///
/// 每个上传的 PDF 构建一次，之后只读。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperDocument {
    sections: Vec<(String, String)>,
}

impl PaperDocument {
    /// 由标题、摘要和章节列表构建文档
    pub fn new(
        title: impl Into<String>,
        abstract_text: impl Into<String>,
        sections: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let mut all = vec![
            ("Title".to_string(), title.into()),
            ("Abstract".to_string(), abstract_text.into()),
        ];
        all.extend(sections);
        Self { sections: all }
    }

    /// 论文标题
    pub fn title(&self) -> &str {
        &self.sections[0].1
    }

    /// 全部 (heading, body) 对，包括 Title 和 Abstract
    pub fn sections(&self) -> &[(String, String)] {
        &self.sections
    }

    /// 正文章节数量（不含 Title / Abstract）
    pub fn body_section_count(&self) -> usize {
        self.sections.len() - 2
    }

    /// 把所有 (heading, body) 用单个换行拼成一段纯文本，首尾空白去掉
    pub fn to_text(&self) -> String {
        let mut parts = Vec::with_capacity(self.sections.len() * 2);
        for (heading, body) in &self.sections {
            parts.push(heading.as_str());
            parts.push(body.as_str());
        }
        parts.join("\n").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_pairs_are_title_and_abstract() {
        let doc = PaperDocument::new(
            "Attention",
            "We propose",
            vec![("Intro".to_string(), "Body".to_string())],
        );
        assert_eq!(doc.title(), "Attention");
        assert_eq!(doc.sections()[1].1, "We propose");
        assert_eq!(doc.body_section_count(), 1);
        assert_eq!(doc.sections()[0].0, "Title");
        assert_eq!(doc.sections()[1].0, "Abstract");
    }

    #[test]
    fn test_to_text_joins_with_newlines() {
        let doc = PaperDocument::new("T", NOT_AVAILABLE, Vec::new());
        assert_eq!(doc.to_text(), "Title\nT\nAbstract\nN/A");
    }
}
