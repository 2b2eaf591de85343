// 该文件是 Xunjing （寻径） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::time::{Duration, Instant};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, luma_plane},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("参数 {0} 无效: {1}")]
  InvalidParameter(&'static str, String),
}

/// 把一张静态图片当作相机，按 `repeat` 次数与 `fps` 节奏重复交付
///
/// URL 形如 `image:///path/to/photo.jpg?repeat=30&fps=10`。
/// `repeat=0` 表示无限重复，省略 `fps` 时不做节流。
pub struct ImageFileInput {
  image: RgbImage,
  luma: Box<[u8]>,
  remaining: Option<u64>,
  period: Option<Duration>,
  next_due: Option<Instant>,
  index: u64,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

fn parse_param<T: std::str::FromStr>(
  url: &Url,
  key: &'static str,
) -> Result<Option<T>, ImageFileInputError> {
  match url.query_pairs().find(|(k, _)| k == key) {
    Some((_, v)) => v
      .parse()
      .map(Some)
      .map_err(|_| ImageFileInputError::InvalidParameter(key, v.to_string())),
    None => Ok(None),
  }
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch);
    }

    let repeat: u64 = parse_param(url, "repeat")?.unwrap_or(1);
    let fps: Option<f64> = parse_param(url, "fps")?;
    let period = match fps {
      Some(fps) if fps > 0.0 && fps.is_finite() => Some(Duration::from_secs_f64(1.0 / fps)),
      Some(fps) => {
        return Err(ImageFileInputError::InvalidParameter("fps", fps.to_string()));
      }
      None => None,
    };

    let image = ImageReader::open(url.path())?.decode()?.into_rgb8();
    Ok(Self::from_image(image, repeat, period))
  }
}

impl ImageFileInput {
  pub fn from_image(image: RgbImage, repeat: u64, period: Option<Duration>) -> Self {
    let luma = luma_plane(&image).into_boxed_slice();
    Self {
      image,
      luma,
      remaining: (repeat > 0).then_some(repeat),
      period,
      next_due: None,
      index: 0,
    }
  }

  fn pace(&mut self) {
    let Some(period) = self.period else {
      return;
    };
    if let Some(due) = self.next_due {
      let now = Instant::now();
      if due > now {
        std::thread::sleep(due - now);
      }
    }
    self.next_due = Some(Instant::now() + period);
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    if let Some(remaining) = self.remaining.as_mut() {
      if *remaining == 0 {
        return None;
      }
      *remaining -= 1;
    }
    self.pace();

    let frame = Frame::new(self.image.clone(), self.luma.clone(), self.index);
    self.index += 1;
    Some(frame)
  }
}
