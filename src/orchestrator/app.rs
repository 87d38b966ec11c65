//! 应用生命周期 - 编排层
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：打印启动信息，加载两个生成引擎（每个进程只加载一次）
//! 2. **单篇运行**：对 `paper_path` 跑完整条流水线
//! 3. **结果落盘**：把运行结果写成 JSON 报告，失败时同样写出错误报告

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{Backend, Config, ModelSettings};
use crate::error::{AppError, ConfigError, FileError, GenerationError};
use crate::infrastructure::scripted::{DRY_RUN_QUESTIONS, DRY_RUN_REVIEW};
use crate::infrastructure::{GenerationParameters, LlamaLoadOptions, ScienceParseExtractor};
use crate::models::PromptVersion;
use crate::orchestrator::review_pipeline::{ReviewOutcome, ReviewPipeline, StageTimings};
use crate::services::GenerationEngine;
use crate::utils::{log_startup, report_timestamp};
use crate::workflow::{PromptGenerator, ReviewGenerator};

/// 写入 `output_file` 的运行报告
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// "success" 或 "error"
    pub state: String,
    pub version: PromptVersion,
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gen_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gen_review: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timings: Option<StageTimings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn success(outcome: ReviewOutcome) -> Self {
        Self {
            state: "success".to_string(),
            version: outcome.version,
            generated_at: report_timestamp(),
            paper_content: Some(outcome.paper_content),
            gen_prompt: Some(outcome.gen_prompt),
            gen_review: Some(outcome.gen_review),
            timings: Some(outcome.timings),
            stage: None,
            error: None,
        }
    }

    pub fn failure(version: PromptVersion, err: &AppError) -> Self {
        Self {
            state: "error".to_string(),
            version,
            generated_at: report_timestamp(),
            paper_content: None,
            gen_prompt: None,
            gen_review: None,
            timings: None,
            stage: Some(err.stage().to_string()),
            error: Some(err.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == "success"
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    pipeline: ReviewPipeline<ScienceParseExtractor>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let (question_engine, review_engine) = build_engines(&config)
            .await
            .context("生成引擎初始化失败")?;

        let extractor = ScienceParseExtractor::new(
            &config.science_parse_jar,
            config.science_parse_heap.clone(),
            &config.json_output_dir,
        );
        let pipeline = ReviewPipeline::new(
            extractor,
            PromptGenerator::new(question_engine),
            ReviewGenerator::new(review_engine),
        );

        Ok(Self { config, pipeline })
    }

    pub fn pipeline(&self) -> &ReviewPipeline<ScienceParseExtractor> {
        &self.pipeline
    }

    /// 运行应用主逻辑：处理一篇论文并写出报告
    ///
    /// 任何失败都会先写出错误报告；报告写不出去时只记日志，返回原始错误。
    pub async fn run(&self) -> Result<RunReport> {
        let version = self.config.prompt_version;
        let result = match self.config.paper_path.as_deref() {
            Some(paper_path) => self.pipeline.run(paper_path, version).await,
            None => Err(AppError::from(ConfigError::InvalidSetting {
                name: "paper_path".to_string(),
                reason: "未指定要评审的论文 (PAPER_PATH)".to_string(),
            })),
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("❌ 论文处理失败 [{}]: {}", err.stage(), err);
                let report = RunReport::failure(version, &err);
                if let Err(write_err) = write_report(&self.config.output_file, &report).await {
                    warn!("错误报告写入失败: {}", write_err);
                }
                let paper = self
                    .config
                    .paper_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                return Err(err).with_context(|| format!("处理论文失败: {}", paper));
            }
        };

        let report = RunReport::success(outcome);
        write_report(&self.config.output_file, &report).await?;
        info!("💾 报告已写入: {}", self.config.output_file.display());
        Ok(report)
    }
}

/// 加载提问 / 评审两个引擎
pub async fn build_engines(
    config: &Config,
) -> Result<(Arc<GenerationEngine>, Arc<GenerationEngine>), AppError> {
    match config.backend {
        Backend::Scripted => {
            let question = GenerationEngine::scripted(
                config.question_model.model_id.clone(),
                DRY_RUN_QUESTIONS,
                config.max_seq_len,
                config.question_generation.clone(),
                config.seed,
            );
            let review = GenerationEngine::scripted(
                config.review_model.model_id.clone(),
                DRY_RUN_REVIEW,
                config.max_seq_len,
                config.review_generation.clone(),
                config.seed,
            );
            Ok((Arc::new(question), Arc::new(review)))
        }
        Backend::Llama => {
            let question = load_llama(
                config,
                "question",
                &config.question_model,
                config.question_generation.clone(),
            )
            .await?;
            let review = load_llama(
                config,
                "review",
                &config.review_model,
                config.review_generation.clone(),
            )
            .await?;
            Ok((Arc::new(question), Arc::new(review)))
        }
    }
}

async fn load_llama(
    config: &Config,
    role: &str,
    model: &ModelSettings,
    params: GenerationParameters,
) -> Result<GenerationEngine, AppError> {
    let model_dir = model
        .model_dir
        .clone()
        .ok_or_else(|| ConfigError::MissingModel {
            role: role.to_string(),
            field: "model_dir".to_string(),
        })?;
    let options = LlamaLoadOptions {
        model_id: model.model_id.clone(),
        model_dir,
        max_seq_len: config.max_seq_len,
        precision: config.precision,
        use_cuda: config.use_cuda,
    };
    let seed = config.seed;

    let engine = tokio::task::spawn_blocking(move || {
        GenerationEngine::load_llama(&options, params, seed)
    })
    .await
    .map_err(|e| GenerationError::model_load(&model.model_id, e))??;

    info!(
        "✓ {} 模型就绪: {} ({}, 上下文 {} tokens)",
        role,
        engine.model_id(),
        engine.device_label(),
        engine.context().tokenizer_max_length()
    );
    Ok(engine)
}

async fn write_report(path: &Path, report: &RunReport) -> Result<(), AppError> {
    let display = path.display().to_string();
    let json = serde_json::to_string_pretty(report).map_err(|e| {
        FileError::write(display.clone(), std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FileError::write(parent.display().to_string(), e))?;
    }
    tokio::fs::write(path, json)
        .await
        .map_err(|e| FileError::write(display, e))?;
    Ok(())
}
