// 该文件是 Xunjing （寻径） 项目的一部分。
// src/output.rs - 输出定义：叠加层、语音、振动、补光灯
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, detection::Detection, feedback::Language};

/// 叠加层：接收当前帧的检测结果（可能为空），坐标为归一化坐标
pub trait Overlay: Send {
  fn render(&self, detections: &[Detection]) -> Result<(), OutputError>;
}

/// 语音合成；新的语句应打断正在播放的语句，而不是排队
pub trait Speaker: Send {
  fn speak(&self, text: &str, language: Language);
}

pub trait Vibrator: Send {
  fn vibrate(&self, duration_ms: u64);
}

/// 相机的补光灯控制，尽力而为，没有闪光灯时为空操作
pub trait TorchControl: Send {
  fn has_flash_unit(&self) -> bool;
  fn enable_torch(&self, on: bool);
}

/// 协调线程持有的全部执行器
pub struct Actuators {
  pub overlay: Box<dyn Overlay>,
  pub speaker: Box<dyn Speaker>,
  pub vibrator: Box<dyn Vibrator>,
  pub torch: Box<dyn TorchControl>,
}

impl Actuators {
  pub fn new(
    overlay: impl Overlay + 'static,
    speaker: impl Speaker + 'static,
    vibrator: impl Vibrator + 'static,
    torch: impl TorchControl + 'static,
  ) -> Self {
    Self {
      overlay: Box::new(overlay),
      speaker: Box::new(speaker),
      vibrator: Box::new(vibrator),
      torch: Box::new(torch),
    }
  }
}

mod log_output;
pub use self::log_output::{LogOverlay, LogSpeaker, LogTorch, LogVibrator};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  Log(LogOverlay),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogOverlay::SCHEME => Ok(OutputWrapper::Log(LogOverlay)),
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl Overlay for OutputWrapper {
  fn render(&self, detections: &[Detection]) -> Result<(), OutputError> {
    match self {
      OutputWrapper::Log(output) => output.render(detections),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output.render(detections),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::{OutputWrapper, TorchControl};
  use crate::FromUrl;

  #[test]
  fn picks_output_by_scheme() {
    let url = url::Url::parse("log://").unwrap();
    assert!(matches!(OutputWrapper::from_url(&url), Ok(OutputWrapper::Log(_))));
    let url = url::Url::parse("rtsp://camera/stream").unwrap();
    assert!(OutputWrapper::from_url(&url).is_err());
  }

  #[test]
  fn log_torch_reports_flash_unit() {
    assert!(super::LogTorch::new(true).has_flash_unit());
    assert!(!super::LogTorch::new(false).has_flash_unit());
  }
}
