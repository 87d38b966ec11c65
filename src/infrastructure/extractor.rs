//! PDF → 结构化 JSON 的外部解析工具
//!
//! 核心流程只从结构化 JSON 开始，外部工具通过 [`Extractor`] 注入。

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ExtractionError;

/// PDF 解析能力
pub trait Extractor: Send + Sync {
    /// 解析 PDF，返回生成的结构化 JSON 文件路径
    fn run(&self, pdf_path: &Path) -> impl Future<Output = Result<PathBuf, ExtractionError>> + Send;
}

/// 只接受 .pdf 扩展名（大小写不敏感）
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// science-parse 命令行工具
///
/// 执行 `java -Xmx<heap> -jar <jar> <pdf> -o <output_dir>`，
/// 产物为 `<output_dir>/<pdf 文件名>.json`。
#[derive(Debug, Clone)]
pub struct ScienceParseExtractor {
    java: String,
    jar_path: PathBuf,
    heap: String,
    output_dir: PathBuf,
}

impl ScienceParseExtractor {
    pub fn new(
        jar_path: impl Into<PathBuf>,
        heap: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            java: "java".to_string(),
            jar_path: jar_path.into(),
            heap: heap.into(),
            output_dir: output_dir.into(),
        }
    }

    /// 指定 java 可执行文件
    pub fn with_java_binary(mut self, java: impl Into<String>) -> Self {
        self.java = java.into();
        self
    }

    /// 预期的输出文件路径
    pub fn output_path_for(&self, pdf_path: &Path) -> PathBuf {
        let file_name = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.output_dir.join(format!("{}.json", file_name))
    }

    fn tool_name(&self) -> String {
        self.jar_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.jar_path.display().to_string())
    }
}

impl Extractor for ScienceParseExtractor {
    async fn run(&self, pdf_path: &Path) -> Result<PathBuf, ExtractionError> {
        if !is_pdf(pdf_path) {
            return Err(ExtractionError::UnsupportedFile {
                path: pdf_path.display().to_string(),
            });
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| ExtractionError::ExtractorFailed {
                tool: self.tool_name(),
                reason: format!("无法创建输出目录 {}: {}", self.output_dir.display(), e),
            })?;

        info!("📄 正在解析 PDF: {}", pdf_path.display());
        debug!(
            java = %self.java,
            jar = %self.jar_path.display(),
            heap = %self.heap,
            "启动 science-parse"
        );

        let status = Command::new(&self.java)
            .arg(format!("-Xmx{}", self.heap))
            .arg("-jar")
            .arg(&self.jar_path)
            .arg(pdf_path)
            .arg("-o")
            .arg(&self.output_dir)
            .status()
            .await
            .map_err(|e| ExtractionError::ExtractorFailed {
                tool: self.tool_name(),
                reason: format!("无法启动 {}: {}", self.java, e),
            })?;

        if !status.success() {
            return Err(ExtractionError::ExtractorFailed {
                tool: self.tool_name(),
                reason: format!("退出状态 {}", status),
            });
        }

        let json_path = self.output_path_for(pdf_path);
        if !json_path.exists() {
            return Err(ExtractionError::OutputMissing {
                path: json_path.display().to_string(),
            });
        }

        info!("✓ PDF 解析完成: {}", json_path.display());
        Ok(json_path)
    }
}
