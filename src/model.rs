// 该文件是 Xunjing （寻径） 项目的一部分。
// src/model.rs - 模型
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

use image::{RgbImage, imageops::FilterType};
use serde::Deserialize;
use thiserror::Error;

/// 推理后端：输入 `[1, S, S, 3]` 的浮点张量，输出原始检测张量
pub trait Model: Send {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 模型声明的输入形状 `[1, S, S, 3]`
  fn input_shape(&self) -> [usize; 4];
  /// 模型声明的输出形状 `[1, d1, d2]`
  fn output_shape(&self) -> [usize; 3];

  fn input_range(&self) -> InputRange {
    InputRange::Unit
  }

  fn infer(&self, input: &InputTensor) -> Result<RawTensor, Self::Error>;
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型不可用: {0}")]
  Unavailable(String),
  #[error("推理失败: {0}")]
  Inference(String),
  #[error("模型路径必须使用 {0} 方案")]
  SchemeMismatch(&'static str),
}

/// 输入像素的数值范围
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputRange {
  /// 0 - 1
  #[default]
  Unit,
  /// 0 - 255
  Byte,
}

/// NHWC 排列的模型输入
#[derive(Debug, Clone)]
pub struct InputTensor {
  size: usize,
  data: Box<[f32]>,
}

impl InputTensor {
  /// 双线性缩放到 `size x size` 后按 NHWC 展开
  pub fn from_image(image: &RgbImage, size: usize, range: InputRange) -> Self {
    let resized = image::imageops::resize(image, size as u32, size as u32, FilterType::Triangle);
    let scale = match range {
      InputRange::Unit => 1.0 / 255.0,
      InputRange::Byte => 1.0,
    };
    let data = resized
      .into_raw()
      .into_iter()
      .map(|value| value as f32 * scale)
      .collect();
    Self { size, data }
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, self.size, self.size, 3]
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }
}

/// 模型输出的原始三维张量
#[derive(Debug, Clone, PartialEq)]
pub struct RawTensor {
  shape: [usize; 3],
  data: Box<[f32]>,
}

impl RawTensor {
  pub fn new(shape: [usize; 3], data: impl Into<Box<[f32]>>) -> Result<Self, DecodeError> {
    let data = data.into();
    let expected = shape.iter().product::<usize>();
    if data.len() != expected {
      return Err(DecodeError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }
    Ok(Self { shape, data })
  }

  pub fn shape(&self) -> [usize; 3] {
    self.shape
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }
}

mod decoder;
mod detector;
mod geometry;
mod replay;

pub use self::decoder::{DecodeConfig, DecodeError, Selection, TensorDecoder};
pub use self::detector::Detector;
pub use self::geometry::{CoordinateScale, GeometryError, Layout, ModelGeometry};
pub use self::replay::{ReplayModel, ReplayModelBuilder};
