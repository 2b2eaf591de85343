// 该文件是 Xunjing （寻径） 项目的一部分。
// src/pipeline/inbox.rs - 单槽丢弃式帧信箱
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

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::frame::Frame;

/// 工作线程取到的任务
#[derive(Debug)]
pub(crate) enum Work {
  Frame(Frame),
  ToggleTorch,
}

#[derive(Default)]
struct Slot {
  frame: Option<Frame>,
  torch_toggle: bool,
  busy: bool,
  closed: bool,
}

impl Slot {
  fn is_idle(&self) -> bool {
    self.closed || !(self.busy || self.torch_toggle || self.frame.is_some())
  }
}

/// 最多保存一帧；新帧覆盖旧帧，旧帧交还给调用方释放
#[derive(Default)]
pub(crate) struct Inbox {
  slot: Mutex<Slot>,
  ready: Condvar,
  idle: Condvar,
}

impl Inbox {
  fn lock(&self) -> MutexGuard<'_, Slot> {
    self.slot.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// 关闭后返回 `Err(frame)`，否则返回被覆盖的旧帧
  pub(crate) fn offer(&self, frame: Frame) -> Result<Option<Frame>, Frame> {
    let mut slot = self.lock();
    if slot.closed {
      return Err(frame);
    }
    let superseded = slot.frame.replace(frame);
    self.ready.notify_one();
    Ok(superseded)
  }

  pub(crate) fn request_torch_toggle(&self) {
    let mut slot = self.lock();
    if !slot.closed {
      slot.torch_toggle = true;
      self.ready.notify_one();
    }
  }

  /// 关闭信箱并取走尚未处理的帧
  pub(crate) fn close(&self) -> Option<Frame> {
    let mut slot = self.lock();
    slot.closed = true;
    slot.torch_toggle = false;
    self.ready.notify_all();
    self.idle.notify_all();
    slot.frame.take()
  }

  /// 阻塞直到有任务；取走后处于执行中直到调用 [`Inbox::done`]，关闭后返回 None
  pub(crate) fn next(&self) -> Option<Work> {
    let mut slot = self.lock();
    loop {
      if slot.closed {
        return None;
      }
      if slot.torch_toggle {
        slot.torch_toggle = false;
        slot.busy = true;
        return Some(Work::ToggleTorch);
      }
      if let Some(frame) = slot.frame.take() {
        slot.busy = true;
        return Some(Work::Frame(frame));
      }
      slot = self
        .ready
        .wait(slot)
        .unwrap_or_else(PoisonError::into_inner);
    }
  }

  pub(crate) fn done(&self) {
    let mut slot = self.lock();
    slot.busy = false;
    if slot.is_idle() {
      self.idle.notify_all();
    }
  }

  /// 阻塞直到信箱为空且工作线程空闲，或信箱已关闭
  pub(crate) fn wait_idle(&self) {
    let mut slot = self.lock();
    while !slot.is_idle() {
      slot = self
        .idle
        .wait(slot)
        .unwrap_or_else(PoisonError::into_inner);
    }
  }
}
