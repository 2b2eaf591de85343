// 该文件是 Xunjing （寻径） 项目的一部分。
// src/model/decoder.rs - 原始检测张量解码
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
use tracing::debug;

use crate::{
  detection::{BoundingBox, Detection},
  labels::Labels,
  model::{
    RawTensor,
    geometry::{BOX_CHANNELS, CoordinateScale, ModelGeometry},
  },
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
  #[error("张量长度不匹配: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("张量形状不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    expected: [usize; 3],
    actual: [usize; 3],
  },
}

/// 解码后保留哪些检测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection {
  /// 只保留分数最高的一个
  Best,
  /// 同类别非极大值抑制
  Nms {
    iou_threshold: f32,
    max_detections: usize,
  },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeConfig {
  pub confidence_threshold: f32,
  pub selection: Selection,
  pub scale: CoordinateScale,
}

impl Default for DecodeConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      selection: Selection::Best,
      scale: CoordinateScale::Auto,
    }
  }
}

/// 纯函数式解码器：原始张量 + 几何信息 -> 检测结果
#[derive(Debug, Clone)]
pub struct TensorDecoder {
  geometry: ModelGeometry,
  config: DecodeConfig,
  labels: Labels,
}

impl TensorDecoder {
  pub fn new(geometry: ModelGeometry, config: DecodeConfig, labels: Labels) -> Self {
    Self {
      geometry,
      config,
      labels,
    }
  }

  pub fn geometry(&self) -> &ModelGeometry {
    &self.geometry
  }

  pub fn decode(&self, tensor: &RawTensor) -> Result<Vec<Detection>, DecodeError> {
    let expected = self.geometry.output_shape();
    if tensor.shape() != expected {
      return Err(DecodeError::ShapeMismatch {
        expected,
        actual: tensor.shape(),
      });
    }

    let data = tensor.data();
    let mut detections: Vec<Detection> = (0..self.geometry.num_anchors)
      .filter_map(|anchor| self.decode_anchor(data, anchor))
      .collect();

    debug!("{} 个锚点通过置信度阈值", detections.len());

    // 稳定排序，分数相同时保留锚点顺序
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let detections = match self.config.selection {
      Selection::Best => {
        detections.truncate(1);
        detections
      }
      Selection::Nms {
        iou_threshold,
        max_detections,
      } => nms(detections, iou_threshold, max_detections),
    };

    Ok(detections)
  }

  fn decode_anchor(&self, data: &[f32], anchor: usize) -> Option<Detection> {
    let g = &self.geometry;

    let mut max_score = 0.0f32;
    let mut class_id = None;
    for c in 0..g.num_classes {
      let score = data[g.index(anchor, BOX_CHANNELS + c)];
      if score > max_score {
        max_score = score;
        class_id = Some(c);
      }
    }

    let class_id = class_id?;
    if max_score <= self.config.confidence_threshold {
      return None;
    }

    let mut cx = data[g.index(anchor, 0)];
    let mut cy = data[g.index(anchor, 1)];
    let mut w = data[g.index(anchor, 2)];
    let mut h = data[g.index(anchor, 3)];

    if ![cx, cy, w, h].iter().all(|v| v.is_finite()) {
      return None;
    }

    let to_unit = match self.config.scale {
      CoordinateScale::Auto => cx > 1.0 || cy > 1.0 || w > 1.0 || h > 1.0,
      CoordinateScale::Pixels => true,
      CoordinateScale::Normalized => false,
    };
    if to_unit {
      let size = g.input_size as f32;
      cx /= size;
      cy /= size;
      w /= size;
      h /= size;
    }

    Some(Detection {
      label: self.labels.name(class_id),
      class_id,
      score: max_score.min(1.0),
      bbox: BoundingBox::from_center(cx, cy, w, h),
    })
  }
}

/// 非极大值抑制，输入需已按分数降序排列
fn nms(mut detections: Vec<Detection>, iou_threshold: f32, max_detections: usize) -> Vec<Detection> {
  let mut result = Vec::new();

  while !detections.is_empty() && result.len() < max_detections {
    let best = detections.remove(0);

    detections.retain(|det| {
      if det.class_id != best.class_id {
        return true;
      }
      best.bbox.iou(&det.bbox) < iou_threshold
    });

    result.push(best);
  }

  result
}
