//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用生命周期
//! - 加载配置指定的两个生成引擎（进程内只加载一次）
//! - 运行一篇论文并写出 JSON 报告
//!
//! ### `review_pipeline` - 单篇论文流水线
//! - PDF / 结构化 JSON → 纯文本 → 提问 → 评审
//! - 记录每个阶段的用时
//!
//! ## 层次关系
//!
//! ```text
//! app (生命周期 + 报告)
//!     ↓
//! review_pipeline (单篇论文)
//!     ↓
//! workflow::PromptGenerator / ReviewGenerator
//!     ↓
//! services (生成引擎 / 模板 / 论文抽取)
//!     ↓
//! infrastructure (模型、采样器、外部解析工具)
//! ```

pub mod app;
pub mod review_pipeline;

pub use app::{build_engines, App, RunReport};
pub use review_pipeline::{ReviewOutcome, ReviewPipeline, StageTimings};
