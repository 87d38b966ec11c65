//! 业务能力层
//!
//! 每个服务只做一件事：生成文本、渲染提示词、抽取论文内容。

pub mod generation_engine;
pub mod paper_extractor;
pub mod template_engine;

pub use generation_engine::{strip_prompt_echo, GenerationEngine};
pub use paper_extractor::PaperContentExtractor;
pub use template_engine::{ExtractionPolicy, PromptTemplateEngine, TemplateSpec, NO_QUESTIONS};
