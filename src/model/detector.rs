// 该文件是 Xunjing （寻径） 项目的一部分。
// src/model/detector.rs - 检测器：预处理 + 推理 + 解码
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

use std::panic::{self, AssertUnwindSafe};

use image::RgbImage;
use tracing::{debug, error, info, warn};

use crate::{
  detection::Detection,
  labels::Labels,
  model::{DecodeConfig, GeometryError, InputTensor, Model, ModelGeometry, TensorDecoder},
};

struct Loaded<M> {
  model: M,
  decoder: TensorDecoder,
}

/// 帧级检测入口，所有推理与解码错误都在这里被吞掉并记录
pub struct Detector<M> {
  inner: Option<Loaded<M>>,
}

impl<M: Model> Detector<M> {
  /// 读取模型声明的形状推导几何信息，形状异常时立即失败
  pub fn new(model: M, config: DecodeConfig, labels: Labels) -> Result<Self, GeometryError> {
    let geometry = ModelGeometry::from_shapes(model.input_shape(), model.output_shape())?;
    info!(
      "模型输入尺寸: {}, 类别数: {}, 锚点数: {}",
      geometry.input_size, geometry.num_classes, geometry.num_anchors
    );
    if labels.len() < geometry.num_classes {
      warn!(
        "标签数量 {} 少于模型类别数 {}，未映射的类别将显示为 ID",
        labels.len(),
        geometry.num_classes
      );
    }

    Ok(Self {
      inner: Some(Loaded {
        model,
        decoder: TensorDecoder::new(geometry, config, labels),
      }),
    })
  }

  /// 模型加载失败时的降级检测器，永远返回空结果
  pub fn unavailable() -> Self {
    Self { inner: None }
  }

  pub fn is_available(&self) -> bool {
    self.inner.is_some()
  }

  pub fn geometry(&self) -> Option<&ModelGeometry> {
    self.inner.as_ref().map(|loaded| loaded.decoder.geometry())
  }

  pub fn detect(&self, image: &RgbImage) -> Vec<Detection> {
    let Some(Loaded { model, decoder }) = &self.inner else {
      return Vec::new();
    };

    let input = InputTensor::from_image(image, decoder.geometry().input_size, model.input_range());

    let now = std::time::Instant::now();
    let raw = match panic::catch_unwind(AssertUnwindSafe(|| model.infer(&input))) {
      Ok(Ok(raw)) => raw,
      Ok(Err(e)) => {
        warn!("推理失败: {}", e);
        return Vec::new();
      }
      Err(payload) => {
        error!("推理过程崩溃: {}", panic_message(payload.as_ref()));
        return Vec::new();
      }
    };
    debug!("推理完成，耗时: {:.2?}", now.elapsed());

    match decoder.decode(&raw) {
      Ok(detections) => detections,
      Err(e) => {
        warn!("解码失败: {}", e);
        Vec::new()
      }
    }
  }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "未知错误".to_string()
  }
}
