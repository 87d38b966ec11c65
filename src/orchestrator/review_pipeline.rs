//! 单篇论文评审流水线 - 编排层
//!
//! ## 职责
//!
//! 1. **定位论文内容**：PDF 交给外部解析工具，结构化 JSON 直接读取
//! 2. **抽取纯文本**：PaperContentExtractor
//! 3. **生成提问**：PromptGenerator
//! 4. **生成评审**：ReviewGenerator（以提问文本为条件）
//! 5. **阶段计时**：每个阶段结束时记录用时
//!
//! 模型推理是阻塞计算，放在 `spawn_blocking` 中执行。

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{AppResult, ExtractionError, GenerationError};
use crate::infrastructure::extractor::{is_pdf, Extractor};
use crate::models::PromptVersion;
use crate::services::PaperContentExtractor;
use crate::utils::{truncate_text, StageTimer};
use crate::workflow::{PromptGenerator, ReviewGenerator};

/// 各阶段用时（秒）
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub extraction: f64,
    pub questions: f64,
    pub review: f64,
}

/// 一篇论文的完整结果
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub version: PromptVersion,
    pub paper_content: String,
    pub gen_prompt: String,
    pub gen_review: String,
    pub timings: StageTimings,
}

/// 评审流水线
pub struct ReviewPipeline<E> {
    extractor: E,
    paper_extractor: PaperContentExtractor,
    prompt_generator: Arc<PromptGenerator>,
    review_generator: Arc<ReviewGenerator>,
}

impl<E: Extractor> ReviewPipeline<E> {
    pub fn new(
        extractor: E,
        prompt_generator: PromptGenerator,
        review_generator: ReviewGenerator,
    ) -> Self {
        Self {
            extractor,
            paper_extractor: PaperContentExtractor::new(),
            prompt_generator: Arc::new(prompt_generator),
            review_generator: Arc::new(review_generator),
        }
    }

    /// 论文文件 → 扁平化文本
    ///
    /// 接受 `.pdf`（先调用外部解析工具）和 `.json`（已是结构化结果）。
    pub async fn paper_content(&self, paper_path: &Path) -> AppResult<String> {
        let json_path = if is_pdf(paper_path) {
            self.extractor.run(paper_path).await?
        } else if has_extension(paper_path, "json") {
            paper_path.to_path_buf()
        } else {
            return Err(ExtractionError::UnsupportedFile {
                path: paper_path.display().to_string(),
            }
            .into());
        };

        let document = self.paper_extractor.extract_file(&json_path)?;
        let content = document.to_text();
        debug!("论文内容预览: {}", truncate_text(&content, 200));
        Ok(content)
    }

    /// 生成带前言的提问文本
    pub async fn questions(&self, paper_content: &str, version: PromptVersion) -> AppResult<String> {
        let generator = Arc::clone(&self.prompt_generator);
        let content = paper_content.to_string();
        tokio::task::spawn_blocking(move || generator.generate_prompt(&content, version))
            .await
            .map_err(join_failed)?
    }

    /// 以提问文本为条件生成评审
    pub async fn review(
        &self,
        paper_content: &str,
        questions: &str,
        version: PromptVersion,
    ) -> AppResult<String> {
        let generator = Arc::clone(&self.review_generator);
        let content = paper_content.to_string();
        let questions = questions.to_string();
        tokio::task::spawn_blocking(move || generator.generate_review(&content, &questions, version))
            .await
            .map_err(join_failed)?
    }

    /// 跑完整条流水线
    pub async fn run(&self, paper_path: &Path, version: PromptVersion) -> AppResult<ReviewOutcome> {
        info!("📚 开始处理论文: {} (版本: {})", paper_path.display(), version);
        let mut timings = StageTimings::default();

        let timer = StageTimer::start("extraction");
        let paper_content = self.paper_content(paper_path).await?;
        timings.extraction = timer.finish();

        let timer = StageTimer::start("questions");
        let gen_prompt = self.questions(&paper_content, version).await?;
        timings.questions = timer.finish();

        let timer = StageTimer::start("review");
        let gen_review = self.review(&paper_content, &gen_prompt, version).await?;
        timings.review = timer.finish();

        info!("✅ 论文处理完成: {}", paper_path.display());
        Ok(ReviewOutcome {
            version,
            paper_content,
            gen_prompt,
            gen_review,
            timings,
        })
    }
}

fn has_extension(path: &Path, expected: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

fn join_failed(err: tokio::task::JoinError) -> GenerationError {
    GenerationError::inference(format!("生成任务异常退出: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::{AppError, Stage};
    use crate::infrastructure::GenerationParameters;
    use crate::services::GenerationEngine;
    use crate::workflow::QUESTIONS_PREAMBLE;

    const PAPER_JSON: &str = r#"{"metadata":{"title":"T","abstractText":null,"sections":[{"heading":"Intro","text":"Body"}]}}"#;

    /// 把预先写好的 JSON 当作解析结果返回
    struct CannedExtractor {
        json_path: PathBuf,
        calls: AtomicUsize,
    }

    impl Extractor for CannedExtractor {
        async fn run(&self, _pdf_path: &Path) -> Result<PathBuf, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.json_path.clone())
        }
    }

    fn engine(reply: &str) -> Arc<GenerationEngine> {
        let params = GenerationParameters {
            min_new_tokens: 0,
            ..Default::default()
        };
        Arc::new(GenerationEngine::scripted("test", reply, 32768, params, None))
    }

    fn pipeline(json_path: PathBuf, questions: &str, review: &str) -> ReviewPipeline<CannedExtractor> {
        ReviewPipeline::new(
            CannedExtractor {
                json_path,
                calls: AtomicUsize::new(0),
            },
            PromptGenerator::new(engine(questions)),
            ReviewGenerator::new(engine(review)),
        )
    }

    #[tokio::test]
    async fn test_pdf_goes_through_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("paper.pdf.json");
        std::fs::write(&json, PAPER_JSON).unwrap();

        let pipeline = pipeline(json, "Intro.\n1. Why?", "Summary Of The Paper\nGood.");
        let outcome = pipeline
            .run(&dir.path().join("paper.pdf"), PromptVersion::Default)
            .await
            .unwrap();

        assert_eq!(pipeline.extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.paper_content, "Title\nT\nAbstract\nN/A\nIntro\nBody");
        assert_eq!(outcome.gen_prompt, format!("{}1. Why?", QUESTIONS_PREAMBLE));
        assert_eq!(outcome.gen_review, "Summary Of The Paper\nGood.");
        assert_eq!(outcome.version, PromptVersion::Default);
    }

    #[test]
    fn test_json_input_skips_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("paper.json");
        std::fs::write(&json, PAPER_JSON).unwrap();

        let pipeline = pipeline(json.clone(), "1. Q", "R");
        let content = tokio_test::block_on(pipeline.paper_content(&json)).unwrap();
        assert_eq!(content, "Title\nT\nAbstract\nN/A\nIntro\nBody");
        assert_eq!(pipeline.extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_input_is_extraction_error() {
        let pipeline = pipeline(PathBuf::from("unused.json"), "1. Q", "R");
        let err = pipeline
            .run(Path::new("notes.docx"), PromptVersion::Default)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Extraction);
    }

    #[tokio::test]
    async fn test_contract_violation_names_field() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("paper.json");
        std::fs::write(&json, r#"{"metadata":{"title":"T","abstractText":"A"}}"#).unwrap();

        let pipeline = pipeline(json.clone(), "1. Q", "R");
        match pipeline.run(&json, PromptVersion::Detailed).await {
            Err(AppError::Extraction(ExtractionError::MissingField { field })) => {
                assert_eq!(field, "metadata.sections")
            }
            other => panic!("unexpected: {:?}", other.map(|o| o.gen_review)),
        }
    }
}
