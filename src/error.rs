use std::fmt;

use thiserror::Error;

/// 错误发生的阶段
///
/// 所有对外暴露的错误都必须能说明自己来自哪个阶段，
/// 这样调用方才能区分"论文解析失败"和"模型失败"。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// 配置加载 / 校验
    Configuration,
    /// PDF → 结构化 JSON → 纯文本
    Extraction,
    /// 提示词渲染
    PromptRendering,
    /// 模型加载与生成
    Generation,
    /// 文件读写
    Io,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuration => "configuration",
            Stage::Extraction => "extraction",
            Stage::PromptRendering => "prompt rendering",
            Stage::Generation => "generation",
            Stage::Io => "io",
        };
        f.write_str(name)
    }
}

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("[configuration] 配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 论文内容解析错误（数据契约）
    #[error("[extraction] 论文解析错误: {0}")]
    Extraction(#[from] ExtractionError),
    /// 提示词渲染错误
    #[error("[prompt rendering] 提示词渲染错误: {0}")]
    Template(#[from] TemplateError),
    /// 模型加载 / 生成错误
    #[error("[generation] 生成错误: {0}")]
    Generation(#[from] GenerationError),
    /// 文件操作错误
    #[error("[io] 文件错误: {0}")]
    File(#[from] FileError),
}

impl AppError {
    /// 错误所属阶段
    pub fn stage(&self) -> Stage {
        match self {
            AppError::Config(_) => Stage::Configuration,
            AppError::Extraction(_) => Stage::Extraction,
            AppError::Template(_) => Stage::PromptRendering,
            AppError::Generation(_) => Stage::Generation,
            AppError::File(_) => Stage::Io,
        }
    }

    /// 是否属于配置类错误（不可重试，立即失败）
    pub fn is_configuration(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::Template(_))
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 缺少模型标识或目录
    #[error("{role} 模型未配置: {field} 为空")]
    MissingModel { role: String, field: String },
    /// 未知的提示词版本
    #[error("未知的提示词版本 '{value}'，只支持 default / detailed")]
    UnknownPromptVersion { value: String },
    /// 参数取值非法
    #[error("配置项 {name} 非法: {reason}")]
    InvalidSetting { name: String, reason: String },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 论文解析错误
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// 结构化 JSON 缺少必需字段
    #[error("结构化 JSON 缺少必需字段: {field}")]
    MissingField { field: String },
    /// 字段类型不符合契约
    #[error("字段 {field} 类型错误: 期望 {expected}")]
    InvalidField { field: String, expected: String },
    /// JSON 本身无法解析
    #[error("JSON解析失败 ({path}): {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// 输入文件不是 PDF
    #[error("不支持的文件类型: {path}，只接受 .pdf")]
    UnsupportedFile { path: String },
    /// 外部解析工具执行失败
    #[error("外部解析工具 {tool} 执行失败: {reason}")]
    ExtractorFailed { tool: String, reason: String },
    /// 外部解析工具未产出 JSON
    #[error("外部解析工具未生成输出文件: {path}")]
    OutputMissing { path: String },
}

/// 提示词渲染错误
#[derive(Debug, Error)]
pub enum TemplateError {
    /// 模板需要前置问题但没有提供
    #[error("模板 {key} 需要前置问题 (prior questions)，但未提供")]
    MissingPriorQuestions { key: String },
    /// 模板目录中没有该组合
    #[error("模板目录中不存在 {key}")]
    UnknownTemplate { key: String },
}

/// 模型加载 / 生成错误
#[derive(Debug, Error)]
pub enum GenerationError {
    /// 提示词为空
    #[error("提示词不能为空")]
    EmptyPrompt,
    /// 提示词超出上下文长度（不做静默截断）
    #[error("提示词长度 {prompt_tokens} tokens 超出上下文上限 {limit} tokens")]
    Capacity { prompt_tokens: usize, limit: usize },
    /// 模型加载失败
    #[error("模型加载失败 ({model}): {message}")]
    ModelLoad { model: String, message: String },
    /// 分词 / 解码失败
    #[error("分词失败: {message}")]
    Tokenizer { message: String },
    /// 前向推理失败
    #[error("推理失败: {message}")]
    Inference { message: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ========== 便捷构造函数 ==========

impl GenerationError {
    /// 创建模型加载错误
    pub fn model_load(model: impl Into<String>, message: impl fmt::Display) -> Self {
        GenerationError::ModelLoad {
            model: model.into(),
            message: message.to_string(),
        }
    }

    /// 创建推理错误
    pub fn inference(message: impl fmt::Display) -> Self {
        GenerationError::Inference {
            message: message.to_string(),
        }
    }

    /// 创建分词错误
    pub fn tokenizer(message: impl fmt::Display) -> Self {
        GenerationError::Tokenizer {
            message: message.to_string(),
        }
    }
}

impl ExtractionError {
    /// 创建缺失字段错误
    pub fn missing(field: impl Into<String>) -> Self {
        ExtractionError::MissingField {
            field: field.into(),
        }
    }

    /// 创建字段类型错误
    pub fn invalid(field: impl Into<String>, expected: impl Into<String>) -> Self {
        ExtractionError::InvalidField {
            field: field.into(),
            expected: expected.into(),
        }
    }
}

impl FileError {
    /// 创建文件读取错误
    pub fn read(path: impl Into<String>, source: std::io::Error) -> Self {
        FileError::ReadFailed {
            path: path.into(),
            source,
        }
    }

    /// 创建文件写入错误
    pub fn write(path: impl Into<String>, source: std::io::Error) -> Self {
        FileError::WriteFailed {
            path: path.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_is_reported_in_message() {
        let err: AppError = ExtractionError::missing("metadata.title").into();
        assert_eq!(err.stage(), Stage::Extraction);
        let msg = err.to_string();
        assert!(msg.contains("extraction"));
        assert!(msg.contains("metadata.title"));

        let err: AppError = GenerationError::Capacity {
            prompt_tokens: 40000,
            limit: 32768,
        }
        .into();
        assert_eq!(err.stage(), Stage::Generation);
        assert!(err.to_string().contains("generation"));
    }

    #[test]
    fn test_template_errors_are_configuration_errors() {
        let err: AppError = TemplateError::MissingPriorQuestions {
            key: "review/default".to_string(),
        }
        .into();
        assert!(err.is_configuration());
        assert_eq!(err.stage(), Stage::PromptRendering);

        let err: AppError = GenerationError::EmptyPrompt.into();
        assert!(!err.is_configuration());
    }
}
