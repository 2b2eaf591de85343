// 该文件是 Xunjing （寻径） 项目的一部分。
// src/mode.rs - 工作模式与模式过滤
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

use crate::detection::Detection;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OperatingMode {
  /// 扫描周围环境
  #[default]
  General,
  /// 寻找指定物体，目标以小写保存
  Finder(String),
}

impl OperatingMode {
  pub fn finder(target: &str) -> Self {
    OperatingMode::Finder(target.trim().to_lowercase())
  }
}

impl std::fmt::Display for OperatingMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      OperatingMode::General => write!(f, "General"),
      OperatingMode::Finder(target) => write!(f, "Finder({})", target),
    }
  }
}

/// 按工作模式筛选检测结果
#[derive(Debug, Clone, Default)]
pub struct ModeFilter {
  /// General 模式下的白名单，None 表示全部放行
  allow_list: Option<Vec<String>>,
}

impl ModeFilter {
  pub fn with_allow_list<S: AsRef<str>>(labels: impl IntoIterator<Item = S>) -> Self {
    Self {
      allow_list: Some(
        labels
          .into_iter()
          .map(|label| label.as_ref().trim().to_lowercase())
          .filter(|label| !label.is_empty())
          .collect(),
      ),
    }
  }

  pub fn allow_list(&self) -> Option<&[String]> {
    self.allow_list.as_deref()
  }

  pub fn apply(&self, detections: Vec<Detection>, mode: &OperatingMode) -> Vec<Detection> {
    match mode {
      OperatingMode::General => match &self.allow_list {
        None => detections,
        Some(allow) => detections
          .into_iter()
          .filter(|det| allow.contains(&det.label.to_lowercase()))
          .collect(),
      },
      // 子串匹配："chair" 也会命中目标 "chai"
      OperatingMode::Finder(target) => detections
        .into_iter()
        .filter(|det| det.label.to_lowercase().contains(target.as_str()))
        .collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::{ModeFilter, OperatingMode};
  use crate::detection::{BoundingBox, Detection};

  fn det(label: &str) -> Detection {
    Detection {
      label: label.to_string(),
      class_id: 0,
      score: 0.9,
      bbox: BoundingBox::from_center(0.5, 0.5, 0.2, 0.2),
    }
  }

  fn labels(detections: &[Detection]) -> Vec<&str> {
    detections.iter().map(|d| d.label.as_str()).collect()
  }

  #[test]
  fn finder_keeps_matching_labels() {
    let out = ModeFilter::default().apply(vec![det("chair"), det("table")], &OperatingMode::finder("chair"));
    assert_eq!(labels(&out), vec!["chair"]);
  }

  #[test]
  fn finder_is_case_insensitive_substring_match() {
    let filter = ModeFilter::default();
    let out = filter.apply(vec![det("Chair"), det("dining table")], &OperatingMode::finder("CHAI"));
    assert_eq!(labels(&out), vec!["Chair"]);
    let out = filter.apply(vec![det("dining table")], &OperatingMode::finder("table"));
    assert_eq!(out.len(), 1);
  }

  #[test]
  fn general_passes_everything_without_allow_list() {
    let out = ModeFilter::default().apply(vec![det("cup"), det("person")], &OperatingMode::General);
    assert_eq!(out.len(), 2);
  }

  #[test]
  fn general_respects_allow_list() {
    let filter = ModeFilter::with_allow_list(["person", "Car", " truck "]);
    let out = filter.apply(
      vec![det("person"), det("cup"), det("car"), det("carrot")],
      &OperatingMode::General,
    );
    assert_eq!(labels(&out), vec!["person", "car"]);
  }
}
