// 该文件是 Xunjing （寻径） 项目的一部分。
// src/model/geometry.rs - 模型输出几何信息
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

use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

/// 框坐标与类别分数占用的保留通道数：cx, cy, w, h
pub const BOX_CHANNELS: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GeometryError {
  #[error("模型输入形状无效: {0:?}, 期望 [1, S, S, 3]")]
  InvalidInputShape([usize; 4]),
  #[error("模型输出形状无效: {0:?}, 期望 [1, 类别数+4, 锚点数] 或 [1, 锚点数, 类别数+4]")]
  InvalidOutputShape([usize; 3]),
  #[error("未知的坐标尺度: {0}")]
  UnknownScale(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
  /// `[1, channels, anchors]`
  ChannelsFirst,
  /// `[1, anchors, channels]`
  ChannelsLast,
}

/// 框坐标所处的空间
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoordinateScale {
  /// 任一坐标大于 1.0 时视为像素坐标
  #[default]
  Auto,
  Pixels,
  Normalized,
}

impl FromStr for CoordinateScale {
  type Err = GeometryError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "auto" => Ok(CoordinateScale::Auto),
      "pixels" | "pixel" => Ok(CoordinateScale::Pixels),
      "normalized" | "unit" => Ok(CoordinateScale::Normalized),
      other => Err(GeometryError::UnknownScale(other.to_string())),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelGeometry {
  pub input_size: usize,
  pub num_classes: usize,
  pub num_anchors: usize,
  pub layout: Layout,
}

impl ModelGeometry {
  /// 从模型声明的输入、输出形状推导几何信息
  ///
  /// 通道轴取 `[1, d1, d2]` 中较小的一维（相等时取 d1，即通道在前）；
  /// 若较小的一维容纳不下框坐标与至少一个类别，则取另一维。
  pub fn from_shapes(input: [usize; 4], output: [usize; 3]) -> Result<Self, GeometryError> {
    let [batch, height, width, channels] = input;
    if batch != 1 || height == 0 || height != width || channels != 3 {
      return Err(GeometryError::InvalidInputShape(input));
    }

    let [batch, d1, d2] = output;
    if batch != 1 || d1 == 0 || d2 == 0 {
      return Err(GeometryError::InvalidOutputShape(output));
    }

    let (layout, total_channels, num_anchors) = match (d1 > BOX_CHANNELS, d2 > BOX_CHANNELS) {
      (true, true) if d1 <= d2 => (Layout::ChannelsFirst, d1, d2),
      (true, true) => (Layout::ChannelsLast, d2, d1),
      (true, false) => (Layout::ChannelsFirst, d1, d2),
      (false, true) => (Layout::ChannelsLast, d2, d1),
      (false, false) => return Err(GeometryError::InvalidOutputShape(output)),
    };

    let geometry = Self {
      input_size: height,
      num_classes: total_channels - BOX_CHANNELS,
      num_anchors,
      layout,
    };
    debug!(
      "模型几何: 输入 {}, 类别 {}, 锚点 {}, 布局 {:?}",
      geometry.input_size, geometry.num_classes, geometry.num_anchors, geometry.layout
    );
    Ok(geometry)
  }

  pub fn channels(&self) -> usize {
    self.num_classes + BOX_CHANNELS
  }

  pub fn output_shape(&self) -> [usize; 3] {
    match self.layout {
      Layout::ChannelsFirst => [1, self.channels(), self.num_anchors],
      Layout::ChannelsLast => [1, self.num_anchors, self.channels()],
    }
  }

  /// 扁平数据中 (锚点, 通道) 的下标
  #[inline]
  pub fn index(&self, anchor: usize, channel: usize) -> usize {
    match self.layout {
      Layout::ChannelsFirst => channel * self.num_anchors + anchor,
      Layout::ChannelsLast => anchor * self.channels() + channel,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::{CoordinateScale, GeometryError, Layout, ModelGeometry};

  #[test]
  fn channels_first_when_anchors_dominate() {
    let g = ModelGeometry::from_shapes([1, 320, 320, 3], [1, 7, 2100]).unwrap();
    assert_eq!(g.layout, Layout::ChannelsFirst);
    assert_eq!(g.num_classes, 3);
    assert_eq!(g.num_anchors, 2100);
    assert_eq!(g.input_size, 320);
    assert_eq!(g.output_shape(), [1, 7, 2100]);
  }

  #[test]
  fn channels_last_when_anchors_lead() {
    let g = ModelGeometry::from_shapes([1, 640, 640, 3], [1, 8400, 84]).unwrap();
    assert_eq!(g.layout, Layout::ChannelsLast);
    assert_eq!(g.num_classes, 80);
    assert_eq!(g.num_anchors, 8400);
    assert_eq!(g.index(2, 5), 2 * 84 + 5);
  }

  #[test]
  fn narrow_axis_too_small_for_channels_is_anchor_axis() {
    let g = ModelGeometry::from_shapes([1, 320, 320, 3], [1, 7, 1]).unwrap();
    assert_eq!(g.layout, Layout::ChannelsFirst);
    assert_eq!(g.num_classes, 3);
    assert_eq!(g.num_anchors, 1);

    let g = ModelGeometry::from_shapes([1, 320, 320, 3], [1, 2, 7]).unwrap();
    assert_eq!(g.layout, Layout::ChannelsLast);
    assert_eq!(g.num_anchors, 2);

    let err = ModelGeometry::from_shapes([1, 320, 320, 3], [1, 4, 3]).unwrap_err();
    assert_eq!(err, GeometryError::InvalidOutputShape([1, 4, 3]));
  }

  #[test]
  fn malformed_shapes_fail_fast() {
    assert!(ModelGeometry::from_shapes([1, 320, 320, 3], [1, 4, 4]).is_err());
    assert!(ModelGeometry::from_shapes([2, 320, 320, 3], [1, 7, 100]).is_err());
    assert!(ModelGeometry::from_shapes([1, 320, 320, 3], [3, 7, 100]).is_err());
    assert!(ModelGeometry::from_shapes([1, 320, 240, 3], [1, 7, 100]).is_err());
  }

  #[test]
  fn scale_parses_from_query_values() {
    assert_eq!("auto".parse::<CoordinateScale>().unwrap(), CoordinateScale::Auto);
    assert_eq!("Pixels".parse::<CoordinateScale>().unwrap(), CoordinateScale::Pixels);
    assert!("meters".parse::<CoordinateScale>().is_err());
  }
}
