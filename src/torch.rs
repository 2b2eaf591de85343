// 该文件是 Xunjing （寻径） 项目的一部分。
// src/torch.rs - 补光灯滞回控制
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
use tracing::debug;

pub const DEFAULT_LOW_THRESHOLD: u8 = 40;
pub const DEFAULT_HIGH_THRESHOLD: u8 = 80;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_SAMPLE_STRIDE: usize = 50;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TorchConfigError {
  #[error("亮度阈值必须满足 low < high，实际 low = {low}, high = {high}")]
  InvalidDeadBand { low: u8, high: u8 },
  #[error("亮度采样步长必须大于 0")]
  ZeroStride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TorchConfig {
  low_threshold: u8,
  high_threshold: u8,
  sample_interval_ms: u64,
  sample_stride: usize,
}

impl Default for TorchConfig {
  fn default() -> Self {
    Self {
      low_threshold: DEFAULT_LOW_THRESHOLD,
      high_threshold: DEFAULT_HIGH_THRESHOLD,
      sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
      sample_stride: DEFAULT_SAMPLE_STRIDE,
    }
  }
}

impl TorchConfig {
  pub fn new(
    low_threshold: u8,
    high_threshold: u8,
    sample_interval_ms: u64,
    sample_stride: usize,
  ) -> Result<Self, TorchConfigError> {
    if low_threshold >= high_threshold {
      return Err(TorchConfigError::InvalidDeadBand {
        low: low_threshold,
        high: high_threshold,
      });
    }
    if sample_stride == 0 {
      return Err(TorchConfigError::ZeroStride);
    }
    Ok(Self {
      low_threshold,
      high_threshold,
      sample_interval_ms,
      sample_stride,
    })
  }

  pub fn low_threshold(&self) -> u8 {
    self.low_threshold
  }

  pub fn high_threshold(&self) -> u8 {
    self.high_threshold
  }

  pub fn sample_interval_ms(&self) -> u64 {
    self.sample_interval_ms
  }

  pub fn sample_stride(&self) -> usize {
    self.sample_stride
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorchTransition {
  On,
  Off,
}

impl TorchTransition {
  pub fn is_on(&self) -> bool {
    matches!(self, TorchTransition::On)
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TorchState {
  pub is_on: bool,
  pub last_sampled_at_ms: Option<u64>,
}

pub struct TorchController {
  config: TorchConfig,
  state: TorchState,
  flash_available: bool,
}

impl TorchController {
  pub fn new(config: TorchConfig, flash_available: bool) -> Self {
    Self {
      config,
      state: TorchState::default(),
      flash_available,
    }
  }

  pub fn config(&self) -> &TorchConfig {
    &self.config
  }

  pub fn state(&self) -> &TorchState {
    &self.state
  }

  fn due(&self, now: u64) -> bool {
    match self.state.last_sampled_at_ms {
      None => true,
      Some(last) => now > last && now - last > self.config.sample_interval_ms,
    }
  }

  /// 间隔内的采样直接忽略；返回需要执行的开关动作
  ///
  /// 状态在动作发出时即视为已执行。流水线只保留最新的开关动作交给执行器，
  /// 因此运行期间硬件最终与此状态一致；关闭流水线后控制器随工作线程一起销毁。
  pub fn evaluate(&mut self, sample: u8, now: u64) -> Option<TorchTransition> {
    if !self.flash_available || !self.due(now) {
      return None;
    }
    self.state.last_sampled_at_ms = Some(now);

    let transition = if sample < self.config.low_threshold && !self.state.is_on {
      TorchTransition::On
    } else if sample > self.config.high_threshold && self.state.is_on {
      TorchTransition::Off
    } else {
      return None;
    };

    debug!("环境亮度 {}，补光灯切换为 {:?}", sample, transition);
    self.state.is_on = transition.is_on();
    Some(transition)
  }

  /// 手动切换，同时重新开始采样间隔
  pub fn toggle(&mut self, now: u64) -> Option<TorchTransition> {
    if !self.flash_available {
      return None;
    }
    let transition = if self.state.is_on {
      TorchTransition::Off
    } else {
      TorchTransition::On
    };
    self.state.is_on = transition.is_on();
    self.state.last_sampled_at_ms = Some(
      self
        .state
        .last_sampled_at_ms
        .map_or(now, |last| last.max(now)),
    );
    Some(transition)
  }
}

#[cfg(test)]
mod tests {
  use super::{TorchConfig, TorchConfigError, TorchController, TorchTransition};

  fn controller() -> TorchController {
    TorchController::new(TorchConfig::new(50, 80, 2000, 20).unwrap(), true)
  }

  #[test]
  fn dark_sample_turns_torch_on_then_rate_limits() {
    let mut torch = controller();
    assert_eq!(torch.evaluate(30, 10_000), Some(TorchTransition::On));
    assert!(torch.state().is_on);
    assert_eq!(torch.evaluate(30, 10_500), None);
    assert_eq!(torch.evaluate(200, 11_999), None);
  }

  #[test]
  fn bright_sample_turns_torch_off_after_interval() {
    let mut torch = controller();
    torch.evaluate(10, 0);
    assert_eq!(torch.evaluate(200, 2_001), Some(TorchTransition::Off));
    assert!(!torch.state().is_on);
  }

  #[test]
  fn dead_band_holds_state() {
    let mut torch = controller();
    assert_eq!(torch.evaluate(65, 0), None);
    let mut now = 2_001;
    assert_eq!(torch.evaluate(10, now), Some(TorchTransition::On));
    for sample in [50, 65, 80] {
      now += 2_001;
      assert_eq!(torch.evaluate(sample, now), None);
      assert!(torch.state().is_on);
    }
  }

  #[test]
  fn never_toggles_twice_within_interval() {
    let mut torch = controller();
    let samples = [10u8, 250, 10, 250, 10, 250, 10, 250, 10, 250];
    let mut toggles = Vec::new();
    for (i, sample) in samples.iter().enumerate() {
      let now = i as u64 * 700;
      if torch.evaluate(*sample, now).is_some() {
        toggles.push(now);
      }
    }
    assert!(toggles.len() >= 2);
    for pair in toggles.windows(2) {
      assert!(pair[1] - pair[0] > 2000, "{:?}", toggles);
    }
  }

  #[test]
  fn same_brightness_never_flips_back() {
    for sample in 0..=255u8 {
      let mut torch = controller();
      let first = torch.evaluate(sample, 0);
      let second = torch.evaluate(sample, 5_000);
      assert!(!(first.is_some() && second.is_some()), "sample {}", sample);
    }
  }

  #[test]
  fn missing_flash_unit_never_transitions() {
    let mut torch = TorchController::new(TorchConfig::default(), false);
    assert_eq!(torch.evaluate(0, 0), None);
    assert_eq!(torch.toggle(10), None);
    assert!(!torch.state().is_on);
  }

  #[test]
  fn manual_toggle_restarts_interval() {
    let mut torch = controller();
    assert_eq!(torch.toggle(1_000), Some(TorchTransition::On));
    assert_eq!(torch.evaluate(255, 2_000), None);
    assert_eq!(torch.evaluate(255, 3_001), Some(TorchTransition::Off));
  }

  #[test]
  fn config_requires_dead_band() {
    assert_eq!(
      TorchConfig::new(80, 80, 1000, 10).unwrap_err(),
      TorchConfigError::InvalidDeadBand { low: 80, high: 80 }
    );
    assert_eq!(TorchConfig::new(10, 80, 1000, 0).unwrap_err(), TorchConfigError::ZeroStride);
  }
}
