//! 预设回复的字节级模型
//!
//! 不需要权重即可跑通整条流程（演练模式），也用于测试。
//! 词表：0 = PAD，1 = BOS，2 = EOS，3..=258 对应字节 0..=255。

use crate::error::GenerationError;
use crate::infrastructure::causal_lm::CausalLm;

const BOS: u32 = 1;
const EOS: u32 = 2;
const BYTE_OFFSET: u32 = 3;
const VOCAB_SIZE: usize = 256 + BYTE_OFFSET as usize;
const TARGET_LOGIT: f32 = 40.0;

/// 演练模式下提问模型的回复
pub const DRY_RUN_QUESTIONS: &str = "Sure. Here is the list.\n\
1. What is the main contribution of the paper compared with prior work?\n\
2. Are the experiments sufficient to support the claims?\n\
3. What are the limitations of the proposed method?";

/// 演练模式下评审模型的回复
pub const DRY_RUN_REVIEW: &str = "Summary Of The Paper\n\
The paper provides a concise overview of its method and findings.\n\n\
Strengths And Weaknesses\n\
The writing is clear; the evaluation could be broader.\n\n\
Questions\n\
See the suggested questions above.\n\n\
Limitations\n\
The authors discuss limitations only briefly.";

/// 逐字节输出预设回复，回复结束后给出 EOS
#[derive(Debug, Clone)]
pub struct ScriptedLm {
    reply: Vec<u8>,
    prompt_len: usize,
    eos: [u32; 1],
}

impl ScriptedLm {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into().into_bytes(),
            prompt_len: 0,
            eos: [EOS],
        }
    }
}

impl CausalLm for ScriptedLm {
    fn encode(&self, text: &str) -> Result<Vec<u32>, GenerationError> {
        let mut ids = Vec::with_capacity(text.len() + 1);
        ids.push(BOS);
        ids.extend(text.bytes().map(|b| b as u32 + BYTE_OFFSET));
        Ok(ids)
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, GenerationError> {
        let bytes: Vec<u8> = tokens
            .iter()
            .filter(|&&t| t >= BYTE_OFFSET && (t as usize) < VOCAB_SIZE)
            .map(|&t| (t - BYTE_OFFSET) as u8)
            .collect();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn eos_token_ids(&self) -> &[u32] {
        &self.eos
    }

    fn reset(&mut self) -> Result<(), GenerationError> {
        self.prompt_len = 0;
        Ok(())
    }

    fn forward(&mut self, tokens: &[u32], index_pos: usize) -> Result<Vec<f32>, GenerationError> {
        if tokens.is_empty() {
            return Err(GenerationError::inference("空输入"));
        }
        if index_pos == 0 {
            self.prompt_len = tokens.len();
        }
        let generated = (index_pos + tokens.len()).saturating_sub(self.prompt_len);
        let next = match self.reply.get(generated) {
            Some(&b) => b as u32 + BYTE_OFFSET,
            None => EOS,
        };

        let mut logits = vec![0.0f32; VOCAB_SIZE];
        logits[next as usize] = TARGET_LOGIT;
        Ok(logits)
    }

    fn device_label(&self) -> String {
        "scripted".to_string()
    }
}
