//! 因果语言模型能力接口
//!
//! 引擎只通过这个 trait 使用模型：分词、前向、解码。
//! 具体实现见 `llama`（candle 本地推理）和 `scripted`（演练 / 测试）。

use crate::error::GenerationError;

/// 已加载的 模型 + tokenizer 对
///
/// `forward` 需要 `&mut self`（KV cache），所以同一个实例上的生成天然是串行的。
pub trait CausalLm: Send {
    /// 编码文本（包含 BOS 等特殊 token），不做截断
    fn encode(&self, text: &str) -> Result<Vec<u32>, GenerationError>;

    /// 解码 token 序列，跳过特殊 token
    fn decode(&self, tokens: &[u32]) -> Result<String, GenerationError>;

    /// 结束 token 集合
    fn eos_token_ids(&self) -> &[u32];

    /// 清空 KV cache，开始新的序列
    fn reset(&mut self) -> Result<(), GenerationError>;

    /// 前向推理，返回最后一个位置的 logits（长度为词表大小）
    ///
    /// `index_pos` 是 `tokens[0]` 在整个序列中的位置。
    fn forward(&mut self, tokens: &[u32], index_pos: usize) -> Result<Vec<f32>, GenerationError>;

    /// 计算设备描述（日志用）
    fn device_label(&self) -> String;
}
