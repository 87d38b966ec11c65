//! 提示词模板 - 业务能力层
//!
//! 两种角色（提问 / 评审）× 两个版本（default / detailed）= 四个固定模板，
//! 以 `"<role>/<version>"` 为键放在一张静态表里。新增版本只需要往表里加一行。
//!
//! 模板文本是模型微调时使用的原始措辞，包括空格和换行，不要改动。

use phf::phf_map;
use tracing::debug;

use crate::error::TemplateError;
use crate::models::{PromptRole, PromptVersion};

/// 提问模板在生成结果中定位问题列表的标记
pub const ENUMERATION_MARKER: &str = "1.";

/// 没有找到问题列表时的固定结果
pub const NO_QUESTIONS: &str = "No questions generated.";

/// 生成结果的抽取策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPolicy {
    /// 从第一次出现 `marker` 的位置截取到结尾，找不到时返回 `fallback`
    ///
    /// 注意：`marker` 在正文任意位置出现都会命中（例如 "version 1.0"），不只是列表开头。
    EnumeratedList {
        marker: &'static str,
        fallback: &'static str,
    },
    /// 整段输出即为结果
    FullText,
}

impl ExtractionPolicy {
    pub fn extract(&self, raw: &str) -> String {
        match *self {
            ExtractionPolicy::EnumeratedList { marker, fallback } => match raw.find(marker) {
                Some(start) => raw[start..].to_string(),
                None => fallback.to_string(),
            },
            ExtractionPolicy::FullText => raw.to_string(),
        }
    }
}

/// 模板目录中的一项
#[derive(Debug, Clone, Copy)]
pub struct TemplateSpec {
    /// 指令模板，占位符为 `{paper_content}`、`{prior_questions}` 和 `{format}`
    pub template: &'static str,
    /// 期望模型输出的章节，逐行拼接后填入 `{format}`
    ///
    /// 条目里的前导换行属于微调时的原始措辞，是输出格式的一部分。
    pub sections: &'static [&'static str],
    pub requires_prior_questions: bool,
    pub extraction: ExtractionPolicy,
}

const LIST_EXTRACTION: ExtractionPolicy = ExtractionPolicy::EnumeratedList {
    marker: ENUMERATION_MARKER,
    fallback: NO_QUESTIONS,
};

const QUESTION_DEFAULT: &str = concat!(
    "[INST] <<SYS>>\n",
    "You are a helpful, respectful and honest assistant. Always answer as helpfully as possible, while being safe.  Your answers should not include any harmful, unethical, racist, sexist, toxic, dangerous, or illegal content. Please ensure that your responses are socially unbiased and positive in nature.\n",
    "If a question does not make any sense, or is not factually coherent, explain why instead of answering something not correct. If you don't know the answer to a question, please don't share false information.\n",
    "<</SYS>>\nRead the following paper carefully:\n{paper_content}\n\n\n",
    "Your task is to construct a list of questions about the paper for the reviewer to answer.\n",
    "\nThe reviewer should answer in the following format:\n{format}\n[/INST]",
);

const QUESTION_DETAILED: &str = concat!(
    "[INST] <<SYS>>\nYou are a helpful, respectful, and honest assistant. Provide detailed, constructive ",
    "questions focusing on comprehensive evaluation of the paper. Ensure your questions adhere to safety ",
    "and ethical guidelines. Your responses must exclude any harmful, unethical, racist, sexist, toxic, ",
    "dangerous, or illegal content. Ensure that your responses are socially unbiased and positive in nature.\n",
    "If a question posed by the paper does not make sense, or is not factually coherent, explain why instead ",
    "of providing incorrect information. If you are uncertain about any details, clarify your uncertainty rather ",
    "than disseminating false information.\n<</SYS>>\nRead the following paper carefully:\n{paper_content}\n",
    "Your task is to construct a list of questions about the paper for an LLM reviewer to answer and provide ",
    "detailed feedback and suggestions for improving the paper. These questions should encourage the reviewer to ",
    "critically assess both the strengths and weaknesses of the work, as well as suggest specific areas for improvement.\n[/INST]",
);

const REVIEW_DEFAULT: &str = concat!(
    "[INST] <<SYS>>\n",
    "You are a helpful, respectful and honest assistant. Always answer as helpfully as possible, while being safe.  Your answers should not include any harmful, unethical, racist, sexist, toxic, dangerous, or illegal content. Please ensure that your responses are socially unbiased and positive in nature.\n",
    "If a question does not make any sense, or is not factually coherent, explain why instead of answering something not correct. If you don't know the answer to a question, please don't share false information.\n",
    "<</SYS>>\nRead the following paper carefully:\n{paper_content}\n\n\n",
    "Your task is to compose a high-quality review of the paper submitted to a top-tier conference.\n",
    "Your review should contain the answers to the following questions:\n{prior_questions}\n",
    "\nWrite your review into following section:\n{format}\n[/INST]",
);

const REVIEW_DETAILED: &str = concat!(
    "[INST] <<SYS>>\n",
    "You are a helpful, respectful, and honest assistant. Provide a detailed and constructive review, focusing on both strengths and areas for improvement. Ensure that your feedback includes specific suggestions for enhancing the paper. Avoid any harmful, unethical, racist, sexist, toxic, dangerous, or illegal content. Please ensure that your responses are socially unbiased and positive in nature.\n",
    "If a question does not make sense, or is not factually coherent, explain why instead of answering incorrectly. If you are unsure about any detail, clarify that uncertainty rather than sharing inaccurate information.\n",
    "<</SYS>>\nRead the following paper carefully:\n{paper_content}\n\n\n",
    "Your task is to compose a high-quality review of the paper submitted to a top-tier conference.\n",
    "In your review, please address the following questions in a concise paragraph:\n{prior_questions}\n",
    "Refer to question prompts. Include specific suggestions for how each weakness can be improved, mentioning particular sections of the paper where relevant",
    "\nWrite your detailed review in the following section:\n{format}\n[/INST]",
);

static TEMPLATES: phf::Map<&'static str, TemplateSpec> = phf_map! {
    "question/default" => TemplateSpec {
        template: QUESTION_DEFAULT,
        sections: &["Summary Of The Paper", "Strengths And Weaknesses"],
        requires_prior_questions: false,
        extraction: LIST_EXTRACTION,
    },
    "question/detailed" => TemplateSpec {
        template: QUESTION_DETAILED,
        sections: &[],
        requires_prior_questions: false,
        extraction: LIST_EXTRACTION,
    },
    "review/default" => TemplateSpec {
        template: REVIEW_DEFAULT,
        sections: &[
            "Summary Of The Paper",
            "Strengths And Weaknesses",
            "Questions",
            "Limitations",
        ],
        requires_prior_questions: true,
        extraction: ExtractionPolicy::FullText,
    },
    "review/detailed" => TemplateSpec {
        template: REVIEW_DETAILED,
        sections: &[
            "Summary of the Paper and Key Points:",
            "\nMain Contributions and Technical Discussion",
            "\nContextual Relevance and Novelty",
            "\nStrengths of the Paper:",
            "\nWeaknesses and Areas for Improvement:",
            "\nQuestions\nConclusion and Final Recommendations",
        ],
        requires_prior_questions: true,
        extraction: ExtractionPolicy::FullText,
    },
};

/// 模板渲染器
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptTemplateEngine;

impl PromptTemplateEngine {
    pub fn new() -> Self {
        Self
    }

    /// 目录键
    pub fn key(role: PromptRole, version: PromptVersion) -> String {
        format!("{}/{}", role.as_str(), version.as_str())
    }

    /// 查找模板
    pub fn spec(
        &self,
        role: PromptRole,
        version: PromptVersion,
    ) -> Result<&'static TemplateSpec, TemplateError> {
        let key = Self::key(role, version);
        TEMPLATES
            .get(key.as_str())
            .ok_or(TemplateError::UnknownTemplate { key })
    }

    /// 渲染提示词
    ///
    /// 论文内容和前置问题原样嵌入，不会被再次解析占位符。
    pub fn render(
        &self,
        role: PromptRole,
        version: PromptVersion,
        paper_content: &str,
        prior_questions: Option<&str>,
    ) -> Result<String, TemplateError> {
        let spec = self.spec(role, version)?;

        if spec.requires_prior_questions && prior_questions.is_none() {
            return Err(TemplateError::MissingPriorQuestions {
                key: Self::key(role, version),
            });
        }
        if !spec.requires_prior_questions && prior_questions.is_some() {
            debug!(role = %role, version = %version, "模板不使用前置问题，已忽略");
        }

        let format = spec.sections.join("\n");
        let prompt = fill_placeholders(spec.template, |name| match name {
            "paper_content" => Some(paper_content),
            "prior_questions" => prior_questions,
            "format" => Some(format.as_str()),
            _ => None,
        });
        Ok(prompt)
    }

    /// 按模板的抽取策略处理生成结果
    pub fn extract(
        &self,
        role: PromptRole,
        version: PromptVersion,
        raw_output: &str,
    ) -> Result<String, TemplateError> {
        Ok(self.spec(role, version)?.extraction.extract(raw_output))
    }
}

/// 单遍替换 `{name}` 占位符；未知名字原样保留
fn fill_placeholders<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => match lookup(&after[..close]) {
                Some(value) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            },
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
