//! 基础设施层
//!
//! 持有稀缺资源（模型权重、计算设备、外部进程），只暴露能力，不认识业务流程。

pub mod causal_lm;
pub mod context;
pub mod extractor;
pub mod llama;
pub mod sampler;
pub mod scripted;

pub use causal_lm::CausalLm;
pub use context::{ModelConfig, ModelContextConfigurator, ScalingMode};
pub use extractor::{Extractor, ScienceParseExtractor};
pub use llama::{InferencePrecision, LlamaBackend, LlamaLoadOptions};
pub use sampler::{GenerationParameters, Sampler};
pub use scripted::ScriptedLm;
