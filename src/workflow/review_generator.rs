//! 评审生成流程 - 流程层
//!
//! 论文内容 + 提问文本 → 评审模板 → 评审模型。整段输出就是评审，不做截取。

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::AppResult;
use crate::models::{GeneratedArtifact, PromptRole, PromptVersion};
use crate::services::{GenerationEngine, PromptTemplateEngine};

/// 评审生成流程
pub struct ReviewGenerator {
    engine: Arc<GenerationEngine>,
    templates: PromptTemplateEngine,
}

impl ReviewGenerator {
    pub fn new(engine: Arc<GenerationEngine>) -> Self {
        Self {
            engine,
            templates: PromptTemplateEngine::new(),
        }
    }

    pub fn engine(&self) -> &GenerationEngine {
        &self.engine
    }

    pub fn generate(
        &self,
        paper_content: &str,
        questions: &str,
        version: PromptVersion,
    ) -> AppResult<GeneratedArtifact> {
        info!(version = %version, "📝 正在生成评审");

        let prompt = self
            .templates
            .render(PromptRole::Review, version, paper_content, Some(questions))?;
        let raw = self.engine.generate(&prompt)?;
        if raw.is_empty() {
            warn!(version = %version, "评审模型没有产出内容");
        }
        let extracted = self.templates.extract(PromptRole::Review, version, &raw)?;

        Ok(GeneratedArtifact {
            raw_model_output: raw,
            extracted_section: extracted,
        })
    }

    /// 生成评审文本
    pub fn generate_review(
        &self,
        paper_content: &str,
        questions: &str,
        version: PromptVersion,
    ) -> AppResult<String> {
        Ok(self.generate(paper_content, questions, version)?.raw_model_output)
    }
}
