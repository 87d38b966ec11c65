//! 文本生成引擎 - 业务能力层
//!
//! 只负责"给一段完整提示词，生成一段文本"，不做任何模板逻辑。
//!
//! ## 约定
//! - 采样是随机的（temperature > 0），同样的提示词每次输出都可能不同
//! - 提示词不截断；超出上下文上限直接报 [`GenerationError::Capacity`]
//! - 解码完整序列后按提示词切分去掉回显；找不到回显时返回空串（"没有产出"，不是错误）
//! - 同一个引擎实例上的生成通过互斥锁串行执行

use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::infrastructure::{
    CausalLm, GenerationParameters, LlamaBackend, LlamaLoadOptions, ModelConfig,
    ModelContextConfigurator, Sampler, ScriptedLm,
};

/// 演练模式下假定的原生上下文长度（Llama-2）
const SCRIPTED_NATIVE_CONTEXT: usize = 4096;

/// 序列起始标记，切分回显前从提示词开头去掉
const SEQUENCE_START: &str = "<s>";

struct EngineState {
    model: Box<dyn CausalLm>,
    sampler: Sampler,
}

/// 生成引擎
///
/// 持有一对 模型 + tokenizer，绑定一份不可变的 [`ModelConfig`]。
/// 进程启动时构建一次，之后只读复用。
pub struct GenerationEngine {
    model_id: String,
    context: ModelConfig,
    params: GenerationParameters,
    device: String,
    state: Mutex<EngineState>,
}

impl GenerationEngine {
    /// 用已经构建好的模型创建引擎
    pub fn new(
        model_id: impl Into<String>,
        context: ModelConfig,
        params: GenerationParameters,
        model: Box<dyn CausalLm>,
        seed: Option<u64>,
    ) -> Self {
        let device = model.device_label();
        Self {
            model_id: model_id.into(),
            context,
            params: params.clone(),
            device,
            state: Mutex::new(EngineState {
                model,
                sampler: Sampler::new(params, seed),
            }),
        }
    }

    /// 从本地目录加载 Llama 模型
    pub fn load_llama(
        options: &LlamaLoadOptions,
        params: GenerationParameters,
        seed: Option<u64>,
    ) -> Result<Self, GenerationError> {
        let (backend, context) = LlamaBackend::load(options)?;
        Ok(Self::new(
            options.model_id.clone(),
            context,
            params,
            Box::new(backend),
            seed,
        ))
    }

    /// 演练模式：使用预设回复的字节级模型
    pub fn scripted(
        model_id: impl Into<String>,
        reply: impl Into<String>,
        max_seq_len: usize,
        params: GenerationParameters,
        seed: Option<u64>,
    ) -> Self {
        let context =
            ModelContextConfigurator::configure(Some(SCRIPTED_NATIVE_CONTEXT), 1.0, max_seq_len);
        Self::new(
            model_id,
            context,
            params,
            Box::new(ScriptedLm::new(reply)),
            seed,
        )
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn context(&self) -> &ModelConfig {
        &self.context
    }

    pub fn device_label(&self) -> &str {
        &self.device
    }

    /// 生成文本
    ///
    /// # 返回
    /// 去掉提示词回显后的文本；回显剥离失败时返回空串
    pub fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let started = Instant::now();
        let mut state = self.state.lock();
        let EngineState { model, sampler } = &mut *state;

        let mut tokens = model.encode(prompt)?;
        let prompt_len = tokens.len();
        let limit = self.context.tokenizer_max_length();
        if prompt_len > limit {
            return Err(GenerationError::Capacity {
                prompt_tokens: prompt_len,
                limit,
            });
        }

        debug!(
            model = %self.model_id,
            prompt_tokens = prompt_len,
            limit,
            "开始生成"
        );

        let max_positions = self.context.effective_context_length();
        let eos_ids = model.eos_token_ids().to_vec();

        model.reset()?;
        let mut logits = model.forward(&tokens, 0)?;
        let mut generated = 0usize;

        while generated < self.params.max_new_tokens {
            let next = sampler.sample(&mut logits, &tokens, generated, &eos_ids)?;
            if eos_ids.contains(&next) {
                break;
            }
            tokens.push(next);
            generated += 1;

            if tokens.len() >= max_positions {
                warn!(
                    model = %self.model_id,
                    positions = max_positions,
                    "已达到上下文上限，停止生成"
                );
                break;
            }
            if generated == self.params.max_new_tokens {
                break;
            }
            logits = model.forward(&[next], tokens.len() - 1)?;
        }

        let decoded = model.decode(&tokens)?;
        drop(state);

        let elapsed = started.elapsed().as_secs_f64();
        info!(
            model = %self.model_id,
            prompt_tokens = prompt_len,
            new_tokens = generated,
            "✓ 生成完成，用时 {:.2}s",
            elapsed
        );

        let output = strip_prompt_echo(&decoded, prompt);
        if output.is_empty() {
            warn!(model = %self.model_id, "解码结果中找不到提示词回显，返回空结果");
        }
        Ok(output)
    }
}

/// 去掉解码结果中的提示词回显
///
/// 先去掉提示词开头的 `<s>`，再按提示词切分，取第一次出现之后的那一段（去首尾空白）。
/// 找不到提示词时返回空串。
pub fn strip_prompt_echo(decoded: &str, prompt: &str) -> String {
    let needle = prompt.trim_start_matches(SEQUENCE_START);
    if needle.is_empty() {
        return String::new();
    }
    match decoded.split(needle).nth(1) {
        Some(segment) => segment.trim().to_string(),
        None => String::new(),
    }
}
