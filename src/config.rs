//! 程序配置
//!
//! 加载顺序：默认值 → `REVIEW_CONFIG` 指向的 TOML 文件（可选）→ 环境变量覆盖 → 校验。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, ConfigError, FileError};
use crate::infrastructure::{GenerationParameters, InferencePrecision};
use crate::models::PromptVersion;

/// 指向 TOML 配置文件的环境变量
pub const CONFIG_FILE_VAR: &str = "REVIEW_CONFIG";

/// 单个模型的位置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Hugging Face 模型名，仅用于标识和日志
    pub model_id: String,
    /// 本地权重目录（config.json / tokenizer.json / *.safetensors）
    pub model_dir: Option<PathBuf>,
}

impl ModelSettings {
    fn named(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            model_dir: None,
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self::named("")
    }
}

/// 推理后端
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// 本地 Llama 权重
    #[default]
    Llama,
    /// 预设回复，不加载权重（演练）
    Scripted,
}

/// 程序配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 模型 ---
    pub question_model: ModelSettings,
    pub review_model: ModelSettings,
    /// 目标上下文长度（token）
    pub max_seq_len: usize,
    pub question_generation: GenerationParameters,
    pub review_generation: GenerationParameters,
    pub precision: InferencePrecision,
    pub use_cuda: bool,
    /// 固定随机种子；不设置时每次输出都不同
    pub seed: Option<u64>,
    pub backend: Backend,
    // --- science-parse ---
    pub science_parse_jar: PathBuf,
    pub science_parse_heap: String,
    pub json_output_dir: PathBuf,
    // --- 本次运行 ---
    /// PDF 或结构化 JSON
    pub paper_path: Option<PathBuf>,
    pub prompt_version: PromptVersion,
    pub output_file: PathBuf,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            question_model: ModelSettings::named("GitBag/Reviewer2_Mp"),
            review_model: ModelSettings::named("GitBag/Reviewer2_Mr"),
            max_seq_len: 32768,
            question_generation: GenerationParameters::default(),
            review_generation: GenerationParameters::default(),
            precision: InferencePrecision::default(),
            use_cuda: true,
            seed: None,
            backend: Backend::default(),
            science_parse_jar: PathBuf::from("./science-parse-cli-assembly-2.0.3.jar"),
            science_parse_heap: "16g".to_string(),
            json_output_dir: PathBuf::from("json"),
            paper_path: None,
            prompt_version: PromptVersion::default(),
            output_file: PathBuf::from("review.json"),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// 读取 TOML 文件，缺省字段取默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let display = path.display().to_string();
        let content =
            std::fs::read_to_string(path).map_err(|e| FileError::read(display.clone(), e))?;
        let config = toml::from_str(&content).map_err(|e| ConfigError::TomlParseFailed {
            path: display,
            source: e,
        })?;
        Ok(config)
    }

    /// 完整加载流程，返回已校验的配置
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var(CONFIG_FILE_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_toml_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        let config = base.with_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// 用环境变量覆盖字段；`lookup` 按变量名取值
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("QUESTION_MODEL_ID") {
            self.question_model.model_id = v;
        }
        if let Some(v) = lookup("QUESTION_MODEL_DIR") {
            self.question_model.model_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("REVIEW_MODEL_ID") {
            self.review_model.model_id = v;
        }
        if let Some(v) = lookup("REVIEW_MODEL_DIR") {
            self.review_model.model_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("MAX_SEQ_LEN") {
            self.max_seq_len = parse_var("MAX_SEQ_LEN", &v, "usize")?;
        }
        if let Some(v) = lookup("PRECISION") {
            self.precision = match v.trim().to_ascii_lowercase().as_str() {
                "f32" => InferencePrecision::F32,
                "f16" => InferencePrecision::F16,
                "bf16" => InferencePrecision::Bf16,
                _ => return Err(parse_failed("PRECISION", &v, "f32 | f16 | bf16")),
            };
        }
        if let Some(v) = lookup("USE_CUDA") {
            self.use_cuda = parse_var("USE_CUDA", &v, "bool")?;
        }
        if let Some(v) = lookup("SEED") {
            self.seed = Some(parse_var("SEED", &v, "u64")?);
        }
        if let Some(v) = lookup("BACKEND") {
            self.backend = match v.trim().to_ascii_lowercase().as_str() {
                "llama" => Backend::Llama,
                "scripted" => Backend::Scripted,
                _ => return Err(parse_failed("BACKEND", &v, "llama | scripted")),
            };
        }
        if let Some(v) = lookup("SCIENCE_PARSE_JAR") {
            self.science_parse_jar = PathBuf::from(v);
        }
        if let Some(v) = lookup("SCIENCE_PARSE_HEAP") {
            self.science_parse_heap = v;
        }
        if let Some(v) = lookup("JSON_OUTPUT_DIR") {
            self.json_output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PAPER_PATH") {
            self.paper_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("PROMPT_VERSION") {
            self.prompt_version = v.parse()?;
        }
        if let Some(v) = lookup("OUTPUT_FILE") {
            self.output_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("VERBOSE_LOGGING") {
            self.verbose_logging = parse_var("VERBOSE_LOGGING", &v, "bool")?;
        }
        Ok(self)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (role, model) in [("question", &self.question_model), ("review", &self.review_model)] {
            if model.model_id.trim().is_empty() {
                return Err(ConfigError::MissingModel {
                    role: role.to_string(),
                    field: "model_id".to_string(),
                });
            }
            if self.backend == Backend::Llama && model.model_dir.is_none() {
                return Err(ConfigError::MissingModel {
                    role: role.to_string(),
                    field: "model_dir".to_string(),
                });
            }
        }

        if self.max_seq_len == 0 {
            return Err(invalid("max_seq_len", "必须大于 0"));
        }

        for (name, params) in [
            ("question_generation", &self.question_generation),
            ("review_generation", &self.review_generation),
        ] {
            validate_params(name, params)?;
        }
        Ok(())
    }
}

fn validate_params(name: &str, params: &GenerationParameters) -> Result<(), ConfigError> {
    if params.temperature.is_nan() || params.temperature < 0.0 {
        return Err(invalid(&format!("{}.temperature", name), "不能为负数"));
    }
    if !(0.0..=1.0).contains(&params.top_p) || params.top_p == 0.0 {
        return Err(invalid(&format!("{}.top_p", name), "取值范围 (0, 1]"));
    }
    if params.max_new_tokens == 0 {
        return Err(invalid(&format!("{}.max_new_tokens", name), "必须大于 0"));
    }
    if params.min_new_tokens > params.max_new_tokens {
        return Err(invalid(
            &format!("{}.min_new_tokens", name),
            "不能超过 max_new_tokens",
        ));
    }
    if params.repetition_penalty.is_nan() || params.repetition_penalty <= 0.0 {
        return Err(invalid(&format!("{}.repetition_penalty", name), "必须大于 0"));
    }
    Ok(())
}

fn parse_var<T: std::str::FromStr>(
    var_name: &str,
    value: &str,
    expected_type: &str,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| parse_failed(var_name, value, expected_type))
}

fn parse_failed(var_name: &str, value: &str, expected_type: &str) -> ConfigError {
    ConfigError::EnvVarParseFailed {
        var_name: var_name.to_string(),
        value: value.to_string(),
        expected_type: expected_type.to_string(),
    }
}

fn invalid(name: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
