//! 上下文长度配置（RoPE 线性缩放）
//!
//! 必须在构建 tokenizer 和模型之前计算：tokenizer 的最大输入长度
//! 和模型的位置编码表都依赖这里的结果。

use serde::Serialize;
use tracing::info;

/// 位置编码缩放方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMode {
    None,
    Linear,
}

/// 模型上下文配置
///
/// 引擎构建时计算一次，之后不可变。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelConfig {
    /// 模型原生上下文长度（已乘上模型自带的缩放因子）；未知时为 None
    pub base_context_length: Option<usize>,
    /// 目标上下文长度
    pub requested_context_length: usize,
    /// 新增的缩放因子，`ceil(requested / base)` 或 1
    pub scaling_factor: f64,
    /// `scaling_factor > 1` 时为 Linear
    pub scaling_mode: ScalingMode,
    /// 模型 config 中已经带有的缩放因子
    pub inherited_factor: f64,
}

impl ModelConfig {
    /// 写入旋转位置编码表的最终因子（继承因子 × 新增因子）
    pub fn rope_factor(&self) -> f64 {
        self.inherited_factor * self.scaling_factor
    }

    /// 缩放之后模型可覆盖的位置数
    pub fn effective_context_length(&self) -> usize {
        match self.base_context_length {
            Some(base) => {
                let scaled = (base as f64 * self.scaling_factor) as usize;
                scaled.max(self.tokenizer_max_length())
            }
            None => self.requested_context_length,
        }
    }

    /// tokenizer 允许的最大输入长度：max(目标长度, 原生长度)
    pub fn tokenizer_max_length(&self) -> usize {
        match self.base_context_length {
            Some(base) => self.requested_context_length.max(base),
            None => self.requested_context_length,
        }
    }

    pub fn is_scaled(&self) -> bool {
        self.scaling_mode == ScalingMode::Linear
    }
}

/// 根据模型原生上下文长度推导缩放配置
pub struct ModelContextConfigurator;

impl ModelContextConfigurator {
    /// 计算上下文配置
    ///
    /// # 参数
    /// - `native_length`: 模型的 `max_position_embeddings`，未定义时传 None
    /// - `inherited_factor`: 模型 config 自带的 rope 缩放因子（没有则为 1）
    /// - `target_length`: 目标序列长度
    pub fn configure(
        native_length: Option<usize>,
        inherited_factor: f64,
        target_length: usize,
    ) -> ModelConfig {
        let inherited_factor = if inherited_factor.is_finite() && inherited_factor >= 1.0 {
            inherited_factor
        } else {
            1.0
        };

        let base = native_length
            .filter(|&n| n > 0)
            .map(|n| (n as f64 * inherited_factor) as usize);

        let scaling_factor = match base {
            Some(base) if target_length > base => target_length.div_ceil(base) as f64,
            _ => 1.0,
        };

        // 因子恰好为 1 时退化为不缩放
        let scaling_mode = if scaling_factor > 1.0 {
            ScalingMode::Linear
        } else {
            ScalingMode::None
        };

        let config = ModelConfig {
            base_context_length: base,
            requested_context_length: target_length,
            scaling_factor,
            scaling_mode,
            inherited_factor,
        };

        if config.is_scaled() {
            info!(
                native = ?base,
                target = target_length,
                factor = scaling_factor,
                "rope scaling factor {}",
                scaling_factor
            );
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_4096_to_32768() {
        let cfg = ModelContextConfigurator::configure(Some(4096), 1.0, 32768);
        assert_eq!(cfg.scaling_factor, 8.0);
        assert_eq!(cfg.scaling_mode, ScalingMode::Linear);
        assert_eq!(cfg.tokenizer_max_length(), 32768);
        assert_eq!(cfg.effective_context_length(), 32768);
    }

    #[test]
    fn test_ceiling_division() {
        let cfg = ModelContextConfigurator::configure(Some(4096), 1.0, 10000);
        assert_eq!(cfg.scaling_factor, 3.0);
        assert_eq!(cfg.effective_context_length(), 12288);
    }

    #[test]
    fn test_native_smaller_than_target_always_linear() {
        for native in [512usize, 1000, 2048, 3000, 4095] {
            for target in [4096usize, 8192, 16385, 32768] {
                let cfg = ModelContextConfigurator::configure(Some(native), 1.0, target);
                let expected = (target as f64 / native as f64).ceil();
                assert_eq!(cfg.scaling_factor, expected, "{native} -> {target}");
                assert_eq!(cfg.scaling_mode, ScalingMode::Linear);
            }
        }
    }

    #[test]
    fn test_native_at_least_target_is_unscaled() {
        for (native, target) in [(4096, 4096), (8192, 4096), (32768, 32768)] {
            let cfg = ModelContextConfigurator::configure(Some(native), 1.0, target);
            assert_eq!(cfg.scaling_factor, 1.0);
            assert_eq!(cfg.scaling_mode, ScalingMode::None);
            assert_eq!(cfg.tokenizer_max_length(), native);
        }
    }

    #[test]
    fn test_unknown_native_length_skips_scaling() {
        let cfg = ModelContextConfigurator::configure(None, 1.0, 32768);
        assert_eq!(cfg.scaling_mode, ScalingMode::None);
        assert_eq!(cfg.scaling_factor, 1.0);
        assert_eq!(cfg.base_context_length, None);
        assert_eq!(cfg.tokenizer_max_length(), 32768);
    }

    #[test]
    fn test_inherited_factor_extends_native_length() {
        // 4096 * 8 已经覆盖 32768，不再追加缩放
        let cfg = ModelContextConfigurator::configure(Some(4096), 8.0, 32768);
        assert_eq!(cfg.base_context_length, Some(32768));
        assert_eq!(cfg.scaling_mode, ScalingMode::None);
        assert_eq!(cfg.rope_factor(), 8.0);

        // 4096 * 2 = 8192，还需要 4 倍；写入位置表的是 2 * 4
        let cfg = ModelContextConfigurator::configure(Some(4096), 2.0, 32768);
        assert_eq!(cfg.scaling_factor, 4.0);
        assert_eq!(cfg.rope_factor(), 8.0);
    }

    #[test]
    fn test_invalid_inherited_factor_is_ignored() {
        let cfg = ModelContextConfigurator::configure(Some(4096), 0.0, 8192);
        assert_eq!(cfg.inherited_factor, 1.0);
        assert_eq!(cfg.scaling_factor, 2.0);
    }
}
