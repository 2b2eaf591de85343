// 该文件是 Xunjing （寻径） 项目的一部分。
// src/config.rs - 流水线配置
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use thiserror::Error;

use crate::{
  feedback::FeedbackConfig,
  mode::{ModeFilter, OperatingMode},
  model::{DecodeConfig, Selection},
  pipeline::PipelineState,
  torch::TorchConfig,
};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值必须位于 [0, 1)，实际为 {0}")]
  ConfidenceOutOfRange(f32),
  #[error("NMS IoU 阈值必须位于 (0, 1]，实际为 {0}")]
  IouOutOfRange(f32),
  #[error("NMS 最大检测数必须大于 0")]
  ZeroMaxDetections,
  #[error("语音间隔与振动间隔必须大于 0")]
  ZeroInterval,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
  pub decode: DecodeConfig,
  pub feedback: FeedbackConfig,
  pub torch: TorchConfig,
  pub filter: ModeFilter,
  pub initial_state: PipelineState,
  pub initial_mode: OperatingMode,
}

impl PipelineConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    let threshold = self.decode.confidence_threshold;
    if !(0.0..1.0).contains(&threshold) {
      return Err(ConfigError::ConfidenceOutOfRange(threshold));
    }
    if let Selection::Nms {
      iou_threshold,
      max_detections,
    } = self.decode.selection
    {
      if !(iou_threshold > 0.0 && iou_threshold <= 1.0) {
        return Err(ConfigError::IouOutOfRange(iou_threshold));
      }
      if max_detections == 0 {
        return Err(ConfigError::ZeroMaxDetections);
      }
    }
    if self.feedback.speak_interval_ms == 0 || self.feedback.vibrate_interval_ms == 0 {
      return Err(ConfigError::ZeroInterval);
    }
    Ok(())
  }
}
