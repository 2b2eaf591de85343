// 该文件是 Xunjing （寻径） 项目的一部分。
// src/task.rs - 任务驱动：把输入帧送进流水线
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
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::Duration,
};
use tracing::{debug, info, warn};

use crate::{
  frame::Frame,
  mode::{ModeFilter, OperatingMode},
  model::{Detector, Model},
  output::Overlay,
  pipeline::PipelineHandle,
};

pub trait Task<I, S>: Sized {
  type Error;
  fn run_task(self, input: I, sink: S) -> Result<(), Self::Error>;
}

/// 单帧检测，不经过流水线，直接输出到叠加层
#[derive(Default, Debug)]
pub struct OneShotTask {
  mode: OperatingMode,
  filter: ModeFilter,
}

impl OneShotTask {
  pub fn new(mode: OperatingMode, filter: ModeFilter) -> Self {
    Self { mode, filter }
  }
}

impl<'a, I: Iterator<Item = Frame>, M: Model, O: Overlay> Task<I, (&'a Detector<M>, &'a O)>
  for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    (detector, output): (&'a Detector<M>, &'a O),
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let detections = detector.detect(frame.image());
    let detections = self.filter.apply(detections, &self.mode);
    info!("推理完成，耗时: {:.2?}，检测到 {} 个目标", now.elapsed(), detections.len());
    output.render(&detections)?;
    Ok(())
  }
}

/// 持续把输入帧投递给流水线，直到输入结束、达到帧数或收到停止信号
///
/// 输入结束或达到帧数时等待流水线排空再返回；收到停止信号时立即返回。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  stop: Arc<AtomicBool>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理；30 秒内未能退出则强制结束进程
  pub fn with_ctrlc(self) -> Result<Self, ctrlc::Error> {
    let stop = self.stop.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      stop.store(true, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(self)
  }
}

impl<'a, I: Iterator<Item = Frame>> Task<I, &'a PipelineHandle> for ContinuousTask {
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: &'a PipelineHandle) -> Result<(), Self::Error> {
    info!("开始任务...");
    let mut frame_count = 0usize;
    let mut interrupted = false;
    for frame in input {
      if self.stop.load(Ordering::SeqCst) {
        warn!("中断信号接收，退出任务循环");
        interrupted = true;
        break;
      }
      pipeline.submit(frame);
      frame_count += 1;
      if frame_count % 100 == 0 {
        debug!("已投递 {} 帧: {:?}", frame_count, pipeline.stats());
      }
      if self.frame_number.is_some_and(|n| frame_count >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_count);
        break;
      }
    }

    if interrupted {
      info!("任务中断，共投递 {} 帧", frame_count);
      return Ok(());
    }
    info!("输入结束，等待流水线处理剩余帧...");
    pipeline.drain();
    info!("任务完成，共投递 {} 帧: {:?}", frame_count, pipeline.stats());
    Ok(())
  }
}
