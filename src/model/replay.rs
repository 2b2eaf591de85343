// 该文件是 Xunjing （寻径） 项目的一部分。
// src/model/replay.rs - 回放录制的原始输出张量
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

use std::{
  path::PathBuf,
  sync::atomic::{AtomicUsize, Ordering},
};

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{InputRange, InputTensor, Model, ModelError, RawTensor},
};

/// 录制文件格式
///
/// ```json
/// { "input_shape": [1, 320, 320, 3], "output_shape": [1, 7, 2100],
///   "input_range": "unit", "frames": [[...], ...] }
/// ```
#[derive(Debug, Deserialize)]
struct ReplayFile {
  input_shape: [usize; 4],
  output_shape: [usize; 3],
  #[serde(default)]
  input_range: InputRange,
  frames: Vec<Vec<f32>>,
}

/// 按调用顺序循环输出录制好的张量，忽略输入图像
pub struct ReplayModel {
  input_shape: [usize; 4],
  output_shape: [usize; 3],
  input_range: InputRange,
  frames: Box<[RawTensor]>,
  cursor: AtomicUsize,
}

impl ReplayModel {
  pub fn from_frames(
    input_shape: [usize; 4],
    output_shape: [usize; 3],
    frames: Vec<Vec<f32>>,
  ) -> Result<Self, ModelError> {
    if frames.is_empty() {
      return Err(ModelError::Unavailable("回放文件不包含任何帧".to_string()));
    }

    let frames = frames
      .into_iter()
      .enumerate()
      .map(|(index, data)| {
        RawTensor::new(output_shape, data)
          .map_err(|e| ModelError::Unavailable(format!("第 {} 帧无效: {}", index, e)))
      })
      .collect::<Result<Box<[_]>, _>>()?;

    Ok(Self {
      input_shape,
      output_shape,
      input_range: InputRange::Unit,
      frames,
      cursor: AtomicUsize::new(0),
    })
  }

  pub fn with_input_range(mut self, range: InputRange) -> Self {
    self.input_range = range;
    self
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }
}

impl Model for ReplayModel {
  type Error = ModelError;

  fn input_shape(&self) -> [usize; 4] {
    self.input_shape
  }

  fn output_shape(&self) -> [usize; 3] {
    self.output_shape
  }

  fn input_range(&self) -> InputRange {
    self.input_range
  }

  fn infer(&self, input: &InputTensor) -> Result<RawTensor, Self::Error> {
    if input.shape() != self.input_shape {
      return Err(ModelError::Inference(format!(
        "输入形状不匹配: 期望 {:?}, 实际 {:?}",
        self.input_shape,
        input.shape()
      )));
    }
    let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
    debug!("回放第 {} 帧输出", index);
    Ok(self.frames[index].clone())
  }
}

pub struct ReplayModelBuilder {
  path: PathBuf,
  input_range: Option<InputRange>,
}

impl FromUrlWithScheme for ReplayModelBuilder {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayModelBuilder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::SchemeMismatch(Self::SCHEME));
    }

    let input_range = url.query_pairs().find_map(|(k, v)| match (k.as_ref(), v.as_ref()) {
      ("range", "unit") => Some(InputRange::Unit),
      ("range", "byte") => Some(InputRange::Byte),
      _ => None,
    });

    Ok(ReplayModelBuilder {
      path: PathBuf::from(url.path()),
      input_range,
    })
  }
}

impl ReplayModelBuilder {
  pub fn build(self) -> Result<ReplayModel, ModelError> {
    info!("加载回放文件: {}", self.path.display());
    let content = std::fs::read_to_string(&self.path)
      .map_err(|e| ModelError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
    let file: ReplayFile = serde_json::from_str(&content)
      .map_err(|e| ModelError::Unavailable(format!("{}: {}", self.path.display(), e)))?;

    let range = self.input_range.unwrap_or(file.input_range);
    let model = ReplayModel::from_frames(file.input_shape, file.output_shape, file.frames)?
      .with_input_range(range);
    info!("回放文件加载完成，共 {} 帧", model.len());
    Ok(model)
  }
}
