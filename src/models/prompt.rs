//! 提示词相关的枚举与生成结果

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 提示词角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    /// 根据论文生成审稿问题
    Question,
    /// 根据论文 + 问题生成完整评审
    Review,
}

impl PromptRole {
    pub fn as_str(self) -> &'static str {
        match self {
            PromptRole::Question => "question",
            PromptRole::Review => "review",
        }
    }
}

impl fmt::Display for PromptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 提示词版本
///
/// 版本同时决定指令措辞和输出的章节结构。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVersion {
    #[default]
    Default,
    Detailed,
}

impl PromptVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            PromptVersion::Default => "default",
            PromptVersion::Detailed => "detailed",
        }
    }
}

impl fmt::Display for PromptVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(PromptVersion::Default),
            "detailed" => Ok(PromptVersion::Detailed),
            _ => Err(ConfigError::UnknownPromptVersion {
                value: s.to_string(),
            }),
        }
    }
}

/// 一次生成的产物
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    /// 去掉提示词回显之后的模型输出（回显剥离失败时为空串）
    pub raw_model_output: String,
    /// 按抽取策略截取出的答案部分
    pub extracted_section: String,
}

impl GeneratedArtifact {
    /// 模型是否真的产出了内容
    pub fn has_output(&self) -> bool {
        !self.raw_model_output.is_empty()
    }
}
