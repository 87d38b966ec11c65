//! 基于 candle 的 Llama 本地推理后端
//!
//! 模型目录采用 Hugging Face 布局：
//!
//! ```text
//! <model_dir>/
//!   config.json
//!   tokenizer.json
//!   model.safetensors | model.safetensors.index.json + 分片
//! ```
//!
//! 加载顺序固定：先读 config.json 计算 [`ModelConfig`]，
//! 再按缩放后的配置构建 tokenizer 与模型。

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::llama::{
    Cache, Config as LlamaModelConfig, Llama, Llama3RopeConfig, Llama3RopeType, LlamaConfig,
    LlamaEosToks,
};
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::infrastructure::causal_lm::CausalLm;
use crate::infrastructure::context::{ModelConfig, ModelContextConfigurator};

/// 推理精度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InferencePrecision {
    F32,
    F16,
    /// Reviewer2 权重原生精度
    #[default]
    Bf16,
}

impl InferencePrecision {
    pub fn to_dtype(self) -> DType {
        match self {
            InferencePrecision::F32 => DType::F32,
            InferencePrecision::F16 => DType::F16,
            InferencePrecision::Bf16 => DType::BF16,
        }
    }
}

/// 加载参数
#[derive(Debug, Clone)]
pub struct LlamaLoadOptions {
    pub model_id: String,
    pub model_dir: PathBuf,
    /// 目标序列长度
    pub max_seq_len: usize,
    pub precision: InferencePrecision,
    pub use_cuda: bool,
}

/// 已加载的 Llama 模型
pub struct LlamaBackend {
    model: Llama,
    cache: Cache,
    config: LlamaModelConfig,
    tokenizer: Tokenizer,
    device: Device,
    dtype: DType,
    eos_token_ids: Vec<u32>,
}

impl LlamaBackend {
    /// 读取模型目录，返回 (后端, 上下文配置)
    pub fn load(options: &LlamaLoadOptions) -> Result<(Self, ModelConfig), GenerationError> {
        let model_id = options.model_id.as_str();
        info!(
            model = model_id,
            model_dir = %options.model_dir.display(),
            precision = ?options.precision,
            "正在加载模型"
        );

        let device = select_device(options.use_cuda);
        let dtype = if device.is_cpu() && options.precision != InferencePrecision::F32 {
            warn!(precision = ?options.precision, "CPU 上改用 f32 推理");
            DType::F32
        } else {
            options.precision.to_dtype()
        };

        // 1. config.json → 上下文配置
        let config_path = options.model_dir.join("config.json");
        let config_str = std::fs::read_to_string(&config_path).map_err(|e| {
            GenerationError::model_load(model_id, format!("{}: {}", config_path.display(), e))
        })?;
        let mut raw: serde_json::Value = serde_json::from_str(&config_str)
            .map_err(|e| GenerationError::model_load(model_id, format!("config.json 解析失败: {}", e)))?;

        let native_length = raw
            .get("max_position_embeddings")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize);
        let inherited_factor = inherited_rope_factor(&raw);

        let context =
            ModelContextConfigurator::configure(native_length, inherited_factor, options.max_seq_len);

        // candle 的 rope_scaling 结构与 HF 的 linear 写法不兼容，由下面重新写入
        if let Some(obj) = raw.as_object_mut() {
            obj.remove("rope_scaling");
        }
        let llama_config: LlamaConfig = serde_json::from_value(raw)
            .map_err(|e| GenerationError::model_load(model_id, format!("config.json 字段不完整: {}", e)))?;
        let mut config = llama_config.into_config(false);
        apply_context(&mut config, &context);

        debug!(
            hidden_size = config.hidden_size,
            num_layers = config.num_hidden_layers,
            vocab_size = config.vocab_size,
            max_position_embeddings = config.max_position_embeddings,
            "模型配置"
        );

        // 2. tokenizer，关闭截断
        let tokenizer_path = options.model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| GenerationError::model_load(model_id, format!("tokenizer 加载失败: {}", e)))?;
        tokenizer
            .with_truncation(None)
            .map_err(|e| GenerationError::model_load(model_id, format!("关闭截断失败: {}", e)))?;

        // 3. 权重
        let weights = find_safetensor_files(&options.model_dir)
            .map_err(|message| GenerationError::model_load(model_id, message))?;
        info!(file_count = weights.len(), "加载 safetensors 权重");

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&weights, dtype, &device)
                .map_err(|e| GenerationError::model_load(model_id, e))?
        };
        let model = Llama::load(vb, &config).map_err(|e| GenerationError::model_load(model_id, e))?;
        let cache = Cache::new(true, dtype, &config, &device)
            .map_err(|e| GenerationError::model_load(model_id, e))?;

        let eos_token_ids = resolve_eos(&config, &tokenizer);

        info!(
            model = model_id,
            device = ?device,
            rope_factor = context.rope_factor(),
            context_length = context.effective_context_length(),
            "✓ 模型加载完成"
        );

        Ok((
            Self {
                model,
                cache,
                config,
                tokenizer,
                device,
                dtype,
                eos_token_ids,
            },
            context,
        ))
    }
}

impl CausalLm for LlamaBackend {
    fn encode(&self, text: &str) -> Result<Vec<u32>, GenerationError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(GenerationError::tokenizer)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, GenerationError> {
        self.tokenizer
            .decode(tokens, true)
            .map_err(GenerationError::tokenizer)
    }

    fn eos_token_ids(&self) -> &[u32] {
        &self.eos_token_ids
    }

    fn reset(&mut self) -> Result<(), GenerationError> {
        self.cache = Cache::new(true, self.dtype, &self.config, &self.device)
            .map_err(GenerationError::inference)?;
        Ok(())
    }

    fn forward(&mut self, tokens: &[u32], index_pos: usize) -> Result<Vec<f32>, GenerationError> {
        let input = Tensor::new(tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(GenerationError::inference)?;

        // [1, vocab]，只有最后一个位置
        let logits = self
            .model
            .forward(&input, index_pos, &mut self.cache)
            .map_err(GenerationError::inference)?;

        logits
            .squeeze(0)
            .and_then(|t| t.to_dtype(DType::F32))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(GenerationError::inference)
    }

    fn device_label(&self) -> String {
        format!("{:?}", self.device)
    }
}

/// 有 CUDA 用 CUDA，否则 CPU
fn select_device(use_cuda: bool) -> Device {
    if !use_cuda {
        return Device::Cpu;
    }
    match Device::cuda_if_available(0) {
        Ok(dev) if dev.is_cuda() => {
            info!("检测到 CUDA，使用 GPU 推理");
            dev
        }
        Ok(_) => {
            warn!("CUDA 不可用，使用 CPU");
            Device::Cpu
        }
        Err(e) => {
            warn!(error = %e, "CUDA 初始化失败，使用 CPU");
            Device::Cpu
        }
    }
}

/// 把上下文配置写进 candle 的模型配置
///
/// 线性缩放 = 所有频率除以同一个因子。candle 只提供 llama3 分段频率表，
/// 两个分段阈值都设在最短波长 (2π) 以下时，每个频率都落在"除以 factor"的分支。
fn apply_context(config: &mut LlamaModelConfig, context: &ModelConfig) {
    config.max_position_embeddings = context.effective_context_length();

    let factor = context.rope_factor();
    if factor > 1.0 {
        let original = context
            .base_context_length
            .map(|base| (base as f64 / context.inherited_factor) as usize)
            .unwrap_or(config.max_position_embeddings)
            .max(1);
        config.rope_scaling = Some(Llama3RopeConfig {
            factor: factor as f32,
            low_freq_factor: original as f32,
            high_freq_factor: 2.0 * original as f32,
            original_max_position_embeddings: original,
            rope_type: Llama3RopeType::Llama3,
        });
    } else {
        config.rope_scaling = None;
    }
}

/// config.json 自带的线性 rope 缩放因子
///
/// 只认 `type`/`rope_type` 为 `linear` 的写法；llama3、dynamic 等其它类型无法折算成线性因子，
/// 记一条警告后按未缩放处理。
fn inherited_rope_factor(raw: &serde_json::Value) -> f64 {
    let Some(scaling) = raw.get("rope_scaling").filter(|v| !v.is_null()) else {
        return 1.0;
    };
    let rope_type = scaling
        .get("type")
        .or_else(|| scaling.get("rope_type"))
        .and_then(|v| v.as_str());
    let factor = scaling.get("factor").and_then(|v| v.as_f64());

    match (rope_type, factor) {
        (Some("linear"), Some(factor)) => factor,
        _ => {
            warn!(
                rope_type = ?rope_type,
                factor = ?factor,
                "config.json 的 rope_scaling 不是线性缩放，忽略该因子"
            );
            1.0
        }
    }
}

fn resolve_eos(config: &LlamaModelConfig, tokenizer: &Tokenizer) -> Vec<u32> {
    let mut ids = match &config.eos_token_id {
        Some(LlamaEosToks::Single(id)) => vec![*id],
        Some(LlamaEosToks::Multiple(ids)) => ids.clone(),
        None => Vec::new(),
    };
    if ids.is_empty() {
        if let Some(id) = tokenizer.token_to_id("</s>") {
            ids.push(id);
        }
    }
    ids
}

/// 查找权重文件：优先读分片索引，否则找单文件
fn find_safetensor_files(model_dir: &Path) -> Result<Vec<PathBuf>, String> {
    let index_path = model_dir.join("model.safetensors.index.json");

    if index_path.exists() {
        let index_str = std::fs::read_to_string(&index_path)
            .map_err(|e| format!("{}: {}", index_path.display(), e))?;
        let index: serde_json::Value =
            serde_json::from_str(&index_str).map_err(|e| format!("索引解析失败: {}", e))?;

        let files: HashSet<&str> = index
            .get("weight_map")
            .and_then(|v| v.as_object())
            .map(|map| map.values().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let mut paths: Vec<PathBuf> = files.into_iter().map(|f| model_dir.join(f)).collect();
        paths.sort();

        if paths.is_empty() {
            return Err("索引中没有 safetensors 文件".to_string());
        }
        return Ok(paths);
    }

    let single = model_dir.join("model.safetensors");
    if single.exists() {
        Ok(vec![single])
    } else {
        Err(format!("{} 中没有 safetensors 文件", model_dir.display()))
    }
}
