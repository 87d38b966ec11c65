//! 随机采样
//!
//! 处理顺序：重复惩罚 → 最少生成长度（屏蔽 EOS）→ 温度 → top-k → top-p → 抽样。

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// 采样参数
///
/// 每个引擎实例固定一份，调用之间不修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParameters {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: usize,
    pub max_new_tokens: usize,
    pub min_new_tokens: usize,
    pub repetition_penalty: f32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.7,
            top_k: 50,
            max_new_tokens: 1024,
            min_new_tokens: 64,
            repetition_penalty: 1.13,
        }
    }
}

/// 带随机数状态的采样器
pub struct Sampler {
    params: GenerationParameters,
    rng: StdRng,
}

impl Sampler {
    /// 创建采样器；`seed` 为 None 时使用系统熵，输出不可复现
    pub fn new(params: GenerationParameters, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { params, rng }
    }

    /// 从最后一个位置的 logits 中抽取下一个 token
    ///
    /// # 参数
    /// - `logits`: 词表大小的 logits，会被原地修改
    /// - `context`: 到目前为止的全部 token（提示词 + 已生成）
    /// - `generated`: 已生成的新 token 数
    /// - `eos_ids`: 结束 token
    pub fn sample(
        &mut self,
        logits: &mut [f32],
        context: &[u32],
        generated: usize,
        eos_ids: &[u32],
    ) -> Result<u32, GenerationError> {
        apply_repetition_penalty(logits, context, self.params.repetition_penalty);

        if generated < self.params.min_new_tokens {
            for &eos in eos_ids {
                if let Some(logit) = logits.get_mut(eos as usize) {
                    *logit = f32::NEG_INFINITY;
                }
            }
        }

        if self.params.temperature <= 0.0 {
            return argmax(logits)
                .map(|idx| idx as u32)
                .ok_or_else(|| GenerationError::inference("logits 中没有有效值"));
        }

        let temperature = self.params.temperature as f32;
        let mut candidates: Vec<(usize, f32)> = logits
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_finite())
            .map(|(i, &l)| (i, l / temperature))
            .collect();

        if candidates.is_empty() {
            return Err(GenerationError::inference("logits 中没有有效值"));
        }

        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        if self.params.top_k > 0 {
            candidates.truncate(self.params.top_k);
        }

        let probs = softmax(&candidates);
        let kept = nucleus(&probs, self.params.top_p);

        let total: f32 = probs[..kept].iter().sum();
        let sample: f32 = self.rng.gen::<f32>() * total;

        let mut cumulative = 0.0;
        for (i, prob) in probs[..kept].iter().enumerate() {
            cumulative += prob;
            if sample < cumulative {
                return Ok(candidates[i].0 as u32);
            }
        }

        // 浮点累加误差兜底
        Ok(candidates[kept - 1].0 as u32)
    }
}

/// 重复惩罚：正 logit 除以惩罚值，负 logit 乘以惩罚值，每个 token 只处理一次
fn apply_repetition_penalty(logits: &mut [f32], context: &[u32], penalty: f32) {
    if (penalty - 1.0).abs() < f32::EPSILON {
        return;
    }
    let mut seen = HashSet::with_capacity(context.len());
    for &token in context {
        if !seen.insert(token) {
            continue;
        }
        if let Some(score) = logits.get_mut(token as usize) {
            *score = if *score < 0.0 {
                *score * penalty
            } else {
                *score / penalty
            };
        }
    }
}

/// 已按降序排列的候选 → 概率
fn softmax(candidates: &[(usize, f32)]) -> Vec<f32> {
    let max = candidates[0].1;
    let exps: Vec<f32> = candidates.iter().map(|(_, l)| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// top-p：保留累计概率首次达到 `top_p` 的最短前缀，至少一个
fn nucleus(probs: &[f32], top_p: f64) -> usize {
    if top_p >= 1.0 {
        return probs.len();
    }
    let mut cumulative = 0.0f64;
    for (i, &p) in probs.iter().enumerate() {
        cumulative += p as f64;
        if cumulative >= top_p {
            return i + 1;
        }
    }
    probs.len()
}

fn argmax(logits: &[f32]) -> Option<usize> {
    logits
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.is_nan() && **l > f32::NEG_INFINITY)
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}
