// 该文件是 Xunjing （寻径） 项目的一部分。
// src/detection.rs - 检测结果定义
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

/// 归一化边界框，四个坐标均位于 [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

impl BoundingBox {
  /// 由中心点与宽高构造，边先排序再截断到 [0, 1]，保证 left <= right, top <= bottom
  pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    let (left, right) = ordered(cx - w / 2.0, cx + w / 2.0);
    let (top, bottom) = ordered(cy - h / 2.0, cy + h / 2.0);
    Self {
      left: left.clamp(0.0, 1.0),
      top: top.clamp(0.0, 1.0),
      right: right.clamp(0.0, 1.0),
      bottom: bottom.clamp(0.0, 1.0),
    }
  }

  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }

  pub fn area(&self) -> f32 {
    self.width() * self.height()
  }

  /// 两个边界框的 IoU
  pub fn iou(&self, other: &BoundingBox) -> f32 {
    let x1 = self.left.max(other.left);
    let y1 = self.top.max(other.top);
    let x2 = self.right.min(other.right);
    let y2 = self.bottom.min(other.bottom);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }

  pub fn as_array(&self) -> [f32; 4] {
    [self.left, self.top, self.right, self.bottom]
  }
}

fn ordered(a: f32, b: f32) -> (f32, f32) {
  if a <= b { (a, b) } else { (b, a) }
}

/// 单个检测结果，生命周期仅限于当前帧
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub label: String,
  pub class_id: usize,
  pub score: f32,
  pub bbox: BoundingBox,
}
