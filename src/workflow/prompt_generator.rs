//! 提问生成流程 - 流程层
//!
//! 流程顺序：
//! 1. 渲染提问模板
//! 2. 提问模型生成
//! 3. 截取编号列表，加上固定前言

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::AppResult;
use crate::models::{GeneratedArtifact, PromptRole, PromptVersion};
use crate::services::{GenerationEngine, PromptTemplateEngine, NO_QUESTIONS};

/// 提问列表前面的固定前言
pub const QUESTIONS_PREAMBLE: &str = "Here are some suggested questions based on the paper provided for review. You may adjust them as needed:\n\n";

/// 提问生成流程
pub struct PromptGenerator {
    engine: Arc<GenerationEngine>,
    templates: PromptTemplateEngine,
}

impl PromptGenerator {
    pub fn new(engine: Arc<GenerationEngine>) -> Self {
        Self {
            engine,
            templates: PromptTemplateEngine::new(),
        }
    }

    pub fn engine(&self) -> &GenerationEngine {
        &self.engine
    }

    /// 生成提问，保留原始输出和截取结果
    pub fn generate(&self, paper_content: &str, version: PromptVersion) -> AppResult<GeneratedArtifact> {
        info!(version = %version, "❓ 正在生成评审问题");

        let prompt = self
            .templates
            .render(PromptRole::Question, version, paper_content, None)?;
        let raw = self.engine.generate(&prompt)?;
        let extracted = self
            .templates
            .extract(PromptRole::Question, version, &raw)?;

        if extracted == NO_QUESTIONS {
            warn!(version = %version, "生成结果中没有编号列表");
        }

        Ok(GeneratedArtifact {
            raw_model_output: raw,
            extracted_section: extracted,
        })
    }

    /// 生成带前言的提问文本
    pub fn generate_prompt(&self, paper_content: &str, version: PromptVersion) -> AppResult<String> {
        let artifact = self.generate(paper_content, version)?;
        Ok(format!("{}{}", QUESTIONS_PREAMBLE, artifact.extracted_section))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::infrastructure::GenerationParameters;

    fn generator(reply: &str) -> PromptGenerator {
        let params = GenerationParameters {
            min_new_tokens: 0,
            ..Default::default()
        };
        PromptGenerator::new(Arc::new(GenerationEngine::scripted(
            "questions", reply, 32768, params, None,
        )))
    }

    #[test]
    fn test_generate_prompt_keeps_list_after_preamble() {
        let out = generator("Sure, here you go.\n1. Why?\n2. How?")
            .generate_prompt("Title\nT", PromptVersion::Default)
            .unwrap();
        assert!(out.starts_with(
            "Here are some suggested questions based on the paper provided for review."
        ));
        assert_eq!(out, format!("{}1. Why?\n2. How?", QUESTIONS_PREAMBLE));
    }

    #[test]
    fn test_reply_without_list_uses_sentinel() {
        let generator = generator("I cannot think of any questions.");
        let artifact = generator.generate("Title\nT", PromptVersion::Detailed).unwrap();
        assert_eq!(artifact.raw_model_output, "I cannot think of any questions.");
        assert_eq!(artifact.extracted_section, NO_QUESTIONS);

        let out = generator
            .generate_prompt("Title\nT", PromptVersion::Detailed)
            .unwrap();
        assert_eq!(out, format!("{}No questions generated.", QUESTIONS_PREAMBLE));
    }

    #[test]
    fn test_paper_too_long_is_a_generation_error() {
        let params = GenerationParameters {
            min_new_tokens: 0,
            ..Default::default()
        };
        let generator = PromptGenerator::new(Arc::new(GenerationEngine::scripted(
            "questions", "1. x", 64, params, None,
        )));
        let err = generator
            .generate_prompt(&"x".repeat(10_000), PromptVersion::Default)
            .unwrap_err();
        assert!(matches!(err, AppError::Generation(_)));
    }
}
