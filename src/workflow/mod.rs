//! 流程层
//!
//! 定义"一次提问生成"和"一次评审生成"各自的步骤，只依赖业务能力层。

pub mod prompt_generator;
pub mod review_generator;

pub use prompt_generator::{PromptGenerator, QUESTIONS_PREAMBLE};
pub use review_generator::ReviewGenerator;
