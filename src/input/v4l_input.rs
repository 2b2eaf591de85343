// 该文件是 Xunjing （寻径） 项目的一部分。
// src/input/v4l_input.rs - V4L 视频输入
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
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;
use v4l::{
  Device, FourCC,
  buffer::Type,
  io::{mmap::Stream, traits::CaptureStream},
  video::Capture,
};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
};

#[derive(Error, Debug)]
pub enum V4lInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("不支持的像素格式: {0}")]
  UnsupportedPixelFormat(String),
}

const YUYV: &[u8; 4] = b"YUYV";
const BUFFER_COUNT: u32 = 4;

/// V4L2 摄像头，协商 YUYV 格式并使用内存映射缓冲区
///
/// URL 形如 `v4l:///dev/video0`，路径为空时使用 `/dev/video0`。
pub struct V4lInput {
  stream: Stream<'static>,
  width: u32,
  height: u32,
  index: u64,
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lInput {
  type Error = V4lInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4lInputError::SchemeMismatch);
    }

    let device_path = if url.path().is_empty() || url.path() == "/" {
      "/dev/video0"
    } else {
      url.path()
    };
    let device = Device::with_path(device_path)?;

    let mut format = device.format()?;
    format.fourcc = FourCC::new(YUYV);
    let format = device.set_format(&format)?;
    if format.fourcc != FourCC::new(YUYV) {
      return Err(V4lInputError::UnsupportedPixelFormat(format.fourcc.to_string()));
    }
    info!(
      "打开摄像头 {}: {}x{} {}",
      device_path, format.width, format.height, format.fourcc
    );

    let stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)?;
    Ok(V4lInput {
      stream,
      width: format.width,
      height: format.height,
      index: 0,
    })
  }
}

/// YUYV 4:2:2 转 RGB（BT.601 整数近似），同时返回 Y 平面
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Option<(RgbImage, Vec<u8>)> {
  let pixels = width as usize * height as usize;
  if width % 2 != 0 || data.len() < pixels * 2 {
    return None;
  }

  let clamp = |v: i32| v.clamp(0, 255) as u8;
  let mut rgb = Vec::with_capacity(pixels * 3);
  let mut luma = Vec::with_capacity(pixels);
  for chunk in data[..pixels * 2].chunks_exact(4) {
    let d = chunk[1] as i32 - 128;
    let e = chunk[3] as i32 - 128;
    for y in [chunk[0], chunk[2]] {
      let c = y as i32 - 16;
      rgb.push(clamp((298 * c + 409 * e + 128) >> 8));
      rgb.push(clamp((298 * c - 100 * d - 208 * e + 128) >> 8));
      rgb.push(clamp((298 * c + 516 * d + 128) >> 8));
      luma.push(y);
    }
  }
  let image = RgbImage::from_raw(width, height, rgb)?;
  Some((image, luma))
}

impl Iterator for V4lInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let (width, height) = (self.width, self.height);
    let converted = match self.stream.next() {
      Ok((buf, _meta)) => yuyv_to_rgb(buf, width, height),
      Err(e) => {
        error!("摄像头采集失败: {}", e);
        return None;
      }
    };

    match converted {
      Some((image, luma)) => {
        let frame = Frame::new(image, luma, self.index);
        self.index += 1;
        Some(frame)
      }
      None => {
        warn!("第 {} 帧数据长度不足，停止采集", self.index);
        None
      }
    }
  }
}
