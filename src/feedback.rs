// 该文件是 Xunjing （寻径） 项目的一部分。
// src/feedback.rs - 语音与振动反馈节流
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

use crate::{detection::Detection, mode::OperatingMode};

pub const DEFAULT_SPEAK_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_VIBRATE_INTERVAL_MS: u64 = 1500;
pub const DEFAULT_VIBRATE_DURATION_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
  #[default]
  English,
  Urdu,
}

#[derive(Error, Debug)]
#[error("未知的语言: {0}")]
pub struct UnknownLanguage(String);

impl FromStr for Language {
  type Err = UnknownLanguage;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "en" | "en-us" | "english" => Ok(Language::English),
      "ur" | "ur-pk" | "urdu" => Ok(Language::Urdu),
      other => Err(UnknownLanguage(other.to_string())),
    }
  }
}

impl Language {
  pub fn tag(&self) -> &'static str {
    match self {
      Language::English => "en-US",
      Language::Urdu => "ur-PK",
    }
  }

  /// 按语言选择文案
  pub fn pick<'a>(&self, english: &'a str, urdu: &'a str) -> &'a str {
    match self {
      Language::English => english,
      Language::Urdu => urdu,
    }
  }
}

/// 标签本地化，由外部字符串表提供
pub trait Localizer: Send {
  fn translate_label(&self, label: &str, language: Language) -> String;
}

impl<L: Localizer + ?Sized> Localizer for Box<L> {
  fn translate_label(&self, label: &str, language: Language) -> String {
    (**self).translate_label(label, language)
  }
}

/// 不做翻译
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocalization;

impl Localizer for NoLocalization {
  fn translate_label(&self, label: &str, _language: Language) -> String {
    label.to_string()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechEvent {
  pub text: String,
  pub language: Language,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VibrationEvent {
  pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feedback {
  pub speech: Option<SpeechEvent>,
  pub vibration: Option<VibrationEvent>,
}

impl Feedback {
  pub fn is_empty(&self) -> bool {
    self.speech.is_none() && self.vibration.is_none()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackConfig {
  pub speak_interval_ms: u64,
  pub vibrate_interval_ms: u64,
  pub vibrate_duration_ms: u64,
  pub language: Language,
}

impl Default for FeedbackConfig {
  fn default() -> Self {
    Self {
      speak_interval_ms: DEFAULT_SPEAK_INTERVAL_MS,
      vibrate_interval_ms: DEFAULT_VIBRATE_INTERVAL_MS,
      vibrate_duration_ms: DEFAULT_VIBRATE_DURATION_MS,
      language: Language::English,
    }
  }
}

/// 各通道上一次输出的时间，None 表示从未输出
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackState {
  pub last_spoken_at_ms: Option<u64>,
  pub last_vibrated_at_ms: Option<u64>,
}

fn elapsed(last: Option<u64>, now: u64, interval: u64) -> bool {
  match last {
    None => true,
    Some(last) => now > last && now - last > interval,
  }
}

pub struct FeedbackThrottle {
  config: FeedbackConfig,
  state: FeedbackState,
  localizer: Box<dyn Localizer>,
}

impl FeedbackThrottle {
  pub fn new(config: FeedbackConfig) -> Self {
    Self {
      config,
      state: FeedbackState::default(),
      localizer: Box::new(NoLocalization),
    }
  }

  pub fn with_localizer<L: Localizer + 'static>(mut self, localizer: L) -> Self {
    self.localizer = Box::new(localizer);
    self
  }

  pub fn state(&self) -> &FeedbackState {
    &self.state
  }

  pub fn config(&self) -> &FeedbackConfig {
    &self.config
  }

  /// 两个通道各自独立判断；被间隔拦下的反馈不会重试
  pub fn evaluate(&mut self, detections: &[Detection], now: u64, mode: &OperatingMode) -> Feedback {
    let Some(best) = detections.first() else {
      return Feedback::default();
    };

    let vibration = if elapsed(self.state.last_vibrated_at_ms, now, self.config.vibrate_interval_ms) {
      self.state.last_vibrated_at_ms = Some(now);
      Some(VibrationEvent {
        duration_ms: self.config.vibrate_duration_ms,
      })
    } else {
      None
    };

    let speech = if elapsed(self.state.last_spoken_at_ms, now, self.config.speak_interval_ms) {
      self.state.last_spoken_at_ms = Some(now);
      Some(self.phrase(&best.label, mode))
    } else {
      None
    };

    Feedback { speech, vibration }
  }

  fn phrase(&self, label: &str, mode: &OperatingMode) -> SpeechEvent {
    let language = self.config.language;
    let text = match language {
      Language::English => match mode {
        OperatingMode::Finder(_) => format!("{} found", label),
        OperatingMode::General => format!("Caution, {}", label),
      },
      Language::Urdu => {
        let label = self.localizer.translate_label(label, language);
        match mode {
          OperatingMode::Finder(_) => format!("{} مل گیا", label),
          OperatingMode::General => format!("خبردار، {}", label),
        }
      }
    };
    SpeechEvent { text, language }
  }
}
