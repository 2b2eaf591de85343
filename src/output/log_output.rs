// 该文件是 Xunjing （寻径） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  detection::Detection,
  feedback::Language,
  output::{Overlay, OutputError, Speaker, TorchControl, Vibrator},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogOverlay;

impl FromUrlWithScheme for LogOverlay {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOverlay {
  type Error = OutputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch);
    }
    Ok(LogOverlay)
  }
}

impl Overlay for LogOverlay {
  fn render(&self, detections: &[Detection]) -> Result<(), OutputError> {
    if detections.is_empty() {
      debug!("叠加层: 无检测结果");
    }
    for det in detections {
      info!(
        "  - {}: {:.2}% at ({:.3}, {:.3}, {:.3}, {:.3})",
        det.label,
        det.score * 100.0,
        det.bbox.left,
        det.bbox.top,
        det.bbox.right,
        det.bbox.bottom
      );
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
  fn speak(&self, text: &str, language: Language) {
    info!("[语音 {}] {}", language.tag(), text);
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogVibrator;

impl Vibrator for LogVibrator {
  fn vibrate(&self, duration_ms: u64) {
    info!("[振动] {} ms", duration_ms);
  }
}

#[derive(Debug, Clone, Copy)]
pub struct LogTorch {
  flash_unit: bool,
}

impl LogTorch {
  pub fn new(flash_unit: bool) -> Self {
    Self { flash_unit }
  }
}

impl TorchControl for LogTorch {
  fn has_flash_unit(&self) -> bool {
    self.flash_unit
  }

  fn enable_torch(&self, on: bool) {
    if self.flash_unit {
      info!("[补光灯] {}", if on { "开启" } else { "关闭" });
    }
  }
}
