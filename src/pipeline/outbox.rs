// 该文件是 Xunjing （寻径） 项目的一部分。
// src/pipeline/outbox.rs - 协调线程的界面更新信箱
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

use std::{
  collections::VecDeque,
  sync::{Condvar, Mutex, MutexGuard, PoisonError},
};

use crate::{
  detection::Detection,
  feedback::{SpeechEvent, VibrationEvent},
  torch::TorchTransition,
};

/// 协调线程一次取走的全部更新
///
/// 执行顺序：补光灯、提示语、播报、振动，最后是叠加层。
#[derive(Debug, Default)]
pub(crate) struct Batch {
  pub(crate) torch: Option<TorchTransition>,
  pub(crate) notices: VecDeque<SpeechEvent>,
  pub(crate) speech: Option<SpeechEvent>,
  pub(crate) vibration: Option<VibrationEvent>,
  pub(crate) overlay: Option<Vec<Detection>>,
}

impl Batch {
  fn is_empty(&self) -> bool {
    self.torch.is_none()
      && self.notices.is_empty()
      && self.speech.is_none()
      && self.vibration.is_none()
      && self.overlay.is_none()
  }
}

fn replace<T>(slot: &mut Option<T>, value: T) -> u64 {
  slot.replace(value).is_some() as u64
}

#[derive(Default)]
struct Pending {
  batch: Batch,
  busy: bool,
  closed: bool,
}

/// 工作线程与协调线程之间的信箱
///
/// 叠加层、播报、振动与补光灯各只保留最新一项，执行器跟不上时旧更新被覆盖。
/// 一次性提示语来自用户操作，逐条保留。
#[derive(Default)]
pub(crate) struct Outbox {
  pending: Mutex<Pending>,
  ready: Condvar,
  idle: Condvar,
}

impl Outbox {
  fn lock(&self) -> MutexGuard<'_, Pending> {
    self.pending.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// 写入更新并返回被覆盖的条数；关闭后写入被忽略
  fn post(&self, update: impl FnOnce(&mut Batch) -> u64) -> u64 {
    let mut pending = self.lock();
    if pending.closed {
      return 0;
    }
    let superseded = update(&mut pending.batch);
    self.ready.notify_one();
    superseded
  }

  pub(crate) fn notice(&self, speech: SpeechEvent) {
    self.post(|batch| {
      batch.notices.push_back(speech);
      0
    });
  }

  pub(crate) fn torch(&self, transition: TorchTransition) -> u64 {
    self.post(|batch| replace(&mut batch.torch, transition))
  }

  pub(crate) fn overlay(&self, detections: Vec<Detection>) -> u64 {
    self.post(|batch| replace(&mut batch.overlay, detections))
  }

  /// 一帧的结果整体写入，协调线程不会只取到其中一部分
  pub(crate) fn frame_result(
    &self,
    speech: Option<SpeechEvent>,
    vibration: Option<VibrationEvent>,
    detections: Vec<Detection>,
  ) -> u64 {
    self.post(|batch| {
      let mut superseded = replace(&mut batch.overlay, detections);
      if let Some(speech) = speech {
        superseded += replace(&mut batch.speech, speech);
      }
      if let Some(vibration) = vibration {
        superseded += replace(&mut batch.vibration, vibration);
      }
      superseded
    })
  }

  /// 阻塞直到有更新，取走后处于执行中直到调用 [`Outbox::done`]；关闭后返回 None
  pub(crate) fn take(&self) -> Option<Batch> {
    let mut pending = self.lock();
    loop {
      if pending.closed {
        return None;
      }
      if !pending.batch.is_empty() {
        pending.busy = true;
        return Some(std::mem::take(&mut pending.batch));
      }
      pending = self
        .ready
        .wait(pending)
        .unwrap_or_else(PoisonError::into_inner);
    }
  }

  pub(crate) fn done(&self) {
    let mut pending = self.lock();
    pending.busy = false;
    self.idle.notify_all();
  }

  /// 关闭信箱并丢弃尚未执行的更新
  pub(crate) fn close(&self) {
    let mut pending = self.lock();
    pending.closed = true;
    pending.batch = Batch::default();
    self.ready.notify_all();
    self.idle.notify_all();
  }

  /// 阻塞直到所有更新执行完毕或信箱关闭
  pub(crate) fn wait_idle(&self) {
    let mut pending = self.lock();
    while !pending.closed && (pending.busy || !pending.batch.is_empty()) {
      pending = self
        .idle
        .wait(pending)
        .unwrap_or_else(PoisonError::into_inner);
    }
  }
}
