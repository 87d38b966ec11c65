//! # Paper Review
//!
//! 用两个本地大模型为学术论文生成评审问题和评审意见
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（模型权重、计算设备、外部进程），只暴露能力
//! - `ModelContextConfigurator` - 按目标长度计算 RoPE 线性缩放
//! - `LlamaBackend` / `ScriptedLm` - `CausalLm` 的两种实现
//! - `Sampler` - 温度 / top-k / top-p / 重复惩罚采样
//! - `ScienceParseExtractor` - PDF → 结构化 JSON
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `GenerationEngine` - 提示词 → 文本（去掉回显）
//! - `PromptTemplateEngine` - (角色, 版本) → 提示词模板 + 抽取策略
//! - `PaperContentExtractor` - 结构化 JSON → 论文文档
//!
//! ### ③ 流程层（Workflow）
//! - `PromptGenerator` - 生成提问列表
//! - `ReviewGenerator` - 以提问为条件生成评审
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/review_pipeline` - 单篇论文的完整流水线
//! - `orchestrator/app` - 应用生命周期与报告输出
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Backend, Config};
pub use error::{AppError, AppResult, Stage};
pub use models::{GeneratedArtifact, PaperDocument, PromptRole, PromptVersion};
pub use orchestrator::{App, ReviewPipeline, RunReport};
pub use services::{GenerationEngine, PaperContentExtractor, PromptTemplateEngine};
pub use workflow::{PromptGenerator, ReviewGenerator};
