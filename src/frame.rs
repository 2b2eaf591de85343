// 该文件是 Xunjing （寻径） 项目的一部分。
// src/frame.rs - 相机帧定义
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

use image::RgbImage;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// 相机交付的一帧
///
/// 帧在处理期间归流水线所有，析构时恰好调用一次释放回调，把缓冲区还给相机。
/// 因此任何退出路径（暂停、被新帧取代、处理完毕、关闭）都会释放缓冲区。
pub struct Frame {
  image: RgbImage,
  luma: Box<[u8]>,
  index: u64,
  release: Option<ReleaseHook>,
}

impl Frame {
  pub fn new(image: RgbImage, luma: impl Into<Box<[u8]>>, index: u64) -> Self {
    Self {
      image,
      luma: luma.into(),
      index,
      release: None,
    }
  }

  /// 由 RGB 图像构造，亮度平面按 BT.601 近似计算
  pub fn from_rgb(image: RgbImage, index: u64) -> Self {
    let luma = luma_plane(&image);
    Self::new(image, luma, index)
  }

  pub fn on_release<F: FnOnce() + Send + 'static>(mut self, hook: F) -> Self {
    self.release = Some(Box::new(hook));
    self
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn luma(&self) -> &[u8] {
    &self.luma
  }

  pub fn index(&self) -> u64 {
    self.index
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  /// 每隔 `stride` 个字节采样一次亮度平面，返回平均值；空平面返回 None
  pub fn brightness(&self, stride: usize) -> Option<u8> {
    let (sum, count) = self
      .luma
      .iter()
      .step_by(stride.max(1))
      .fold((0u64, 0u64), |(sum, count), &v| (sum + v as u64, count + 1));
    (count > 0).then(|| (sum / count) as u8)
  }
}

impl Drop for Frame {
  fn drop(&mut self) {
    if let Some(release) = self.release.take() {
      release();
    }
  }
}

impl std::fmt::Debug for Frame {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Frame")
      .field("index", &self.index)
      .field("width", &self.image.width())
      .field("height", &self.image.height())
      .finish()
  }
}

pub fn luma_plane(image: &RgbImage) -> Vec<u8> {
  image
    .pixels()
    .map(|p| ((77 * p[0] as u32 + 150 * p[1] as u32 + 29 * p[2] as u32) >> 8) as u8)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::Frame;
  use image::{Rgb, RgbImage};
  use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  };

  #[test]
  fn brightness_samples_every_nth_byte() {
    let luma: Vec<u8> = (0..100).map(|i| if i % 10 == 0 { 200 } else { 0 }).collect();
    let frame = Frame::new(RgbImage::new(10, 10), luma, 0);
    assert_eq!(frame.brightness(10), Some(200));
    assert_eq!(frame.brightness(1), Some(20));
  }

  #[test]
  fn empty_luma_has_no_brightness() {
    let frame = Frame::new(RgbImage::new(1, 1), Vec::new(), 0);
    assert_eq!(frame.brightness(50), None);
  }

  #[test]
  fn rgb_frames_derive_luma() {
    let white = Frame::from_rgb(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])), 0);
    assert_eq!(white.luma().len(), 16);
    assert_eq!(white.brightness(1), Some(255));
    let black = Frame::from_rgb(RgbImage::new(4, 4), 0);
    assert_eq!(black.brightness(3), Some(0));
  }

  #[test]
  fn release_hook_runs_once_on_drop() {
    let released = Arc::new(AtomicUsize::new(0));
    let counter = released.clone();
    let frame = Frame::from_rgb(RgbImage::new(2, 2), 1).on_release(move || {
      counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(released.load(Ordering::SeqCst), 0);
    drop(frame);
    assert_eq!(released.load(Ordering::SeqCst), 1);
  }
}
