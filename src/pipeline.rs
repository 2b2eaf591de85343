// 该文件是 Xunjing （寻径） 项目的一部分。
// src/pipeline.rs - 帧处理流水线
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

//! 帧处理流水线
//!
//! 相机线程通过 [`PipelineHandle::submit`] 投递帧，信箱只保留最新的一帧。
//! 工作线程依次完成亮度采样、推理、过滤与反馈节流，
//! 产生的界面更新写入协调线程的信箱，由协调线程调用执行器。
//! 两个信箱都只保留最新的工作，执行器或推理变慢时积压不会增长。
//! 关闭时先关上执行闸门，此后不会再有任何执行器调用。

use std::{
  fmt,
  sync::{
    Arc, Mutex, PoisonError, RwLock,
    atomic::{AtomicU64, Ordering},
  },
  thread::JoinHandle,
};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  clock::{Clock, SystemClock},
  command::Command,
  config::{ConfigError, PipelineConfig},
  feedback::{FeedbackThrottle, Language, Localizer, NoLocalization, SpeechEvent},
  frame::Frame,
  mode::{ModeFilter, OperatingMode},
  model::{Detector, Model},
  output::Actuators,
  torch::TorchController,
};

mod inbox;
mod outbox;
use self::{
  inbox::{Inbox, Work},
  outbox::{Batch, Outbox},
};

pub const GREETING_GENERAL: (&str, &str) = ("Detection started", "تلاش شروع ہو گئی ہے");
pub const GREETING_FINDER: (&str, &str) = ("Searching", "تلاش شروع");

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("无法启动线程: {0}")]
  Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
  Idle,
  #[default]
  Active,
}

impl fmt::Display for PipelineState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PipelineState::Idle => write!(f, "idle"),
      PipelineState::Active => write!(f, "active"),
    }
  }
}

/// 帧计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
  /// 完成推理的帧
  pub processed: u64,
  /// 在信箱中被新帧覆盖的帧
  pub superseded: u64,
  /// 空闲状态下直接释放的帧
  pub idle_released: u64,
  /// 推理完成时已暂停，结果被丢弃的帧
  pub discarded: u64,
  /// 执行前被更新的结果覆盖的界面更新
  pub stale_updates: u64,
}

#[derive(Default)]
struct Counters {
  processed: AtomicU64,
  superseded: AtomicU64,
  idle_released: AtomicU64,
  discarded: AtomicU64,
  stale_updates: AtomicU64,
}

impl Counters {
  fn snapshot(&self) -> PipelineStats {
    PipelineStats {
      processed: self.processed.load(Ordering::SeqCst),
      superseded: self.superseded.load(Ordering::SeqCst),
      idle_released: self.idle_released.load(Ordering::SeqCst),
      discarded: self.discarded.load(Ordering::SeqCst),
      stale_updates: self.stale_updates.load(Ordering::SeqCst),
    }
  }
}

struct Control {
  state: PipelineState,
  mode: OperatingMode,
}

struct Shared {
  control: RwLock<Control>,
  inbox: Inbox,
  outbox: Outbox,
  counters: Counters,
}

impl Shared {
  fn state(&self) -> PipelineState {
    self.control.read().unwrap_or_else(PoisonError::into_inner).state
  }

  fn stale(&self, superseded: u64) {
    if superseded > 0 {
      self.counters.stale_updates.fetch_add(superseded, Ordering::SeqCst);
    }
  }
}

/// 可克隆的控制句柄，可在任意线程使用
#[derive(Clone)]
pub struct PipelineHandle {
  shared: Arc<Shared>,
  language: Language,
}

impl PipelineHandle {
  /// 投递一帧；空闲时立即释放，否则覆盖信箱中尚未处理的帧
  pub fn submit(&self, frame: Frame) {
    if self.shared.state() == PipelineState::Idle {
      self.shared.counters.idle_released.fetch_add(1, Ordering::SeqCst);
      drop(frame);
      return;
    }
    match self.shared.inbox.offer(frame) {
      Ok(Some(superseded)) => {
        self.shared.counters.superseded.fetch_add(1, Ordering::SeqCst);
        drop(superseded);
      }
      Ok(None) => {}
      Err(rejected) => {
        debug!("流水线已关闭，丢弃第 {} 帧", rejected.index());
      }
    }
  }

  pub fn state(&self) -> PipelineState {
    self.shared.state()
  }

  pub fn mode(&self) -> OperatingMode {
    self
      .shared
      .control
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .mode
      .clone()
  }

  pub fn stats(&self) -> PipelineStats {
    self.shared.counters.snapshot()
  }

  fn set_state(&self, state: PipelineState) {
    let mut control = self.shared.control.write().unwrap_or_else(PoisonError::into_inner);
    if control.state == state {
      return;
    }
    control.state = state;
    info!("流水线状态切换为 {}", state);
    if state == PipelineState::Idle {
      // 在写锁内清空叠加层，晚到的结果无法覆盖清空
      self.shared.stale(self.shared.outbox.overlay(Vec::new()));
    }
  }

  pub fn pause(&self) {
    self.set_state(PipelineState::Idle);
  }

  pub fn resume(&self) {
    self.set_state(PipelineState::Active);
  }

  pub fn toggle(&self) {
    match self.state() {
      PipelineState::Idle => self.resume(),
      PipelineState::Active => self.pause(),
    }
  }

  pub fn set_mode(&self, mode: OperatingMode) {
    let mut control = self.shared.control.write().unwrap_or_else(PoisonError::into_inner);
    info!("工作模式切换为 {}", mode);
    control.mode = mode;
  }

  /// 请求手动切换补光灯，由工作线程执行
  pub fn toggle_torch(&self) {
    self.shared.inbox.request_torch_toggle();
  }

  /// 朗读一次性提示，不受节流限制
  pub fn notify(&self, english: &str, urdu: &str) {
    self.shared.outbox.notice(SpeechEvent {
      text: self.language.pick(english, urdu).to_string(),
      language: self.language,
    });
  }

  /// 等待已投递的帧处理完毕、界面更新全部执行后返回
  ///
  /// 用于输入自然结束时；等待期间继续投递的帧也会被等待。
  pub fn drain(&self) {
    self.shared.inbox.wait_idle();
    self.shared.outbox.wait_idle();
    debug!("流水线已排空: {:?}", self.stats());
  }

  fn announce(&self, mode: &OperatingMode) {
    let (english, urdu) = match mode {
      OperatingMode::General => GREETING_GENERAL,
      OperatingMode::Finder(_) => GREETING_FINDER,
    };
    self.notify(english, urdu);
  }

  /// 执行一条语音命令
  pub fn apply(&self, command: Command) {
    debug!("执行命令 {:?}", command);
    match command {
      Command::Find(target) => {
        let mode = OperatingMode::finder(&target);
        self.set_mode(mode.clone());
        self.resume();
        self.announce(&mode);
      }
      Command::General => {
        self.set_mode(OperatingMode::General);
        self.resume();
        self.announce(&OperatingMode::General);
      }
      Command::Torch => self.toggle_torch(),
      Command::Pause => self.pause(),
      Command::Resume => self.resume(),
    }
  }
}

struct Worker<M> {
  shared: Arc<Shared>,
  detector: Detector<M>,
  filter: ModeFilter,
  throttle: FeedbackThrottle,
  torch: TorchController,
  clock: Arc<dyn Clock>,
}

impl<M: Model> Worker<M> {
  fn run(mut self) {
    while let Some(work) = self.shared.inbox.next() {
      match work {
        Work::Frame(frame) => self.process(frame),
        Work::ToggleTorch => {
          if let Some(transition) = self.torch.toggle(self.clock.now_millis()) {
            self.shared.stale(self.shared.outbox.torch(transition));
          }
        }
      }
      self.shared.inbox.done();
    }
    debug!("工作线程退出");
  }

  fn process(&mut self, frame: Frame) {
    if self.shared.state() != PipelineState::Active {
      self.shared.counters.idle_released.fetch_add(1, Ordering::SeqCst);
      return;
    }

    let stride = self.torch.config().sample_stride();
    if let Some(sample) = frame.brightness(stride) {
      if let Some(transition) = self.torch.evaluate(sample, self.clock.now_millis()) {
        self.shared.stale(self.shared.outbox.torch(transition));
      }
    }

    let detections = self.detector.detect(frame.image());
    let index = frame.index();
    drop(frame);
    self.shared.counters.processed.fetch_add(1, Ordering::SeqCst);

    // 持有读锁直到结果写入信箱，暂停时的清空只会覆盖本帧结果
    let control = self.shared.control.read().unwrap_or_else(PoisonError::into_inner);
    if control.state != PipelineState::Active {
      debug!("第 {} 帧推理完成时已暂停，丢弃结果", index);
      self.shared.counters.discarded.fetch_add(1, Ordering::SeqCst);
      return;
    }

    let detections = self.filter.apply(detections, &control.mode);
    let feedback = self
      .throttle
      .evaluate(&detections, self.clock.now_millis(), &control.mode);

    let superseded =
      self.shared.outbox.frame_result(feedback.speech, feedback.vibration, detections);
    self.shared.stale(superseded);
  }
}

/// 执行闸门；关闭后协调线程不再调用执行器
type Gate = Arc<Mutex<bool>>;

/// 线程退出时（包括崩溃）关闭对应信箱，等待方不会永久阻塞
struct CloseOnExit<F: FnMut()>(F);

impl<F: FnMut()> Drop for CloseOnExit<F> {
  fn drop(&mut self) {
    (self.0)()
  }
}

fn actuate(actuators: &Actuators, batch: Batch) {
  if let Some(transition) = batch.torch {
    actuators.torch.enable_torch(transition.is_on());
  }
  for notice in batch.notices {
    actuators.speaker.speak(&notice.text, notice.language);
  }
  if let Some(speech) = batch.speech {
    actuators.speaker.speak(&speech.text, speech.language);
  }
  if let Some(vibration) = batch.vibration {
    actuators.vibrator.vibrate(vibration.duration_ms);
  }
  if let Some(detections) = batch.overlay {
    if let Err(e) = actuators.overlay.render(&detections) {
      warn!("叠加层输出失败: {}", e);
    }
  }
}

fn coordinate(shared: Arc<Shared>, actuators: Actuators, gate: Gate) {
  while let Some(batch) = shared.outbox.take() {
    {
      let open = gate.lock().unwrap_or_else(PoisonError::into_inner);
      if !*open {
        break;
      }
      actuate(&actuators, batch);
    }
    shared.outbox.done();
  }
  debug!("协调线程退出");
}

pub struct FramePipelineBuilder<M> {
  config: PipelineConfig,
  detector: Detector<M>,
  actuators: Actuators,
  clock: Arc<dyn Clock>,
  localizer: Box<dyn Localizer>,
}

impl<M: Model + 'static> FramePipelineBuilder<M> {
  pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
    self.clock = Arc::new(clock);
    self
  }

  pub fn localizer(mut self, localizer: impl Localizer + 'static) -> Self {
    self.localizer = Box::new(localizer);
    self
  }

  pub fn start(self) -> Result<FramePipeline, PipelineError> {
    let FramePipelineBuilder {
      config,
      detector,
      actuators,
      clock,
      localizer,
    } = self;
    config.validate()?;

    let flash_available = actuators.torch.has_flash_unit();
    if !flash_available {
      info!("未检测到闪光灯，补光控制已停用");
    }
    if !detector.is_available() {
      warn!("模型不可用，流水线将不产生检测结果");
    }

    let shared = Arc::new(Shared {
      control: RwLock::new(Control {
        state: config.initial_state,
        mode: config.initial_mode.clone(),
      }),
      inbox: Inbox::default(),
      outbox: Outbox::default(),
      counters: Counters::default(),
    });
    let gate: Gate = Arc::new(Mutex::new(true));

    let coordinator = {
      let shared = shared.clone();
      let gate = gate.clone();
      std::thread::Builder::new()
        .name("xunjing-coordinator".to_string())
        .spawn(move || {
          let _close = CloseOnExit(|| shared.outbox.close());
          coordinate(shared.clone(), actuators, gate)
        })?
    };

    let worker = Worker {
      shared: shared.clone(),
      detector,
      filter: config.filter.clone(),
      throttle: FeedbackThrottle::new(config.feedback).with_localizer(localizer),
      torch: TorchController::new(config.torch, flash_available),
      clock,
    };
    let handle = PipelineHandle {
      shared,
      language: config.feedback.language,
    };

    let worker = match std::thread::Builder::new()
      .name("xunjing-worker".to_string())
      .spawn(move || {
        let shared = worker.shared.clone();
        let _close = CloseOnExit(|| drop(shared.inbox.close()));
        worker.run()
      }) {
      Ok(worker) => worker,
      Err(e) => {
        handle.shared.outbox.close();
        let _ = coordinator.join();
        return Err(PipelineError::Spawn(e));
      }
    };

    info!(
      "流水线已启动，状态 {}，模式 {}",
      config.initial_state, config.initial_mode
    );
    handle.announce(&config.initial_mode);

    Ok(FramePipeline {
      handle,
      gate,
      worker: Some(worker),
      coordinator: Some(coordinator),
    })
  }
}

/// 流水线本体；析构时自动关闭
pub struct FramePipeline {
  handle: PipelineHandle,
  gate: Gate,
  worker: Option<JoinHandle<()>>,
  coordinator: Option<JoinHandle<()>>,
}

impl FramePipeline {
  pub fn builder<M: Model + 'static>(
    config: PipelineConfig,
    detector: Detector<M>,
    actuators: Actuators,
  ) -> FramePipelineBuilder<M> {
    FramePipelineBuilder {
      config,
      detector,
      actuators,
      clock: Arc::new(SystemClock),
      localizer: Box::new(NoLocalization),
    }
  }

  pub fn handle(&self) -> PipelineHandle {
    self.handle.clone()
  }

  pub fn submit(&self, frame: Frame) {
    self.handle.submit(frame)
  }

  pub fn state(&self) -> PipelineState {
    self.handle.state()
  }

  pub fn stats(&self) -> PipelineStats {
    self.handle.stats()
  }

  pub fn notify(&self, english: &str, urdu: &str) {
    self.handle.notify(english, urdu)
  }

  pub fn drain(&self) {
    self.handle.drain()
  }

  /// 关闭流水线；可重复调用
  pub fn shutdown(&mut self) {
    if self.worker.is_none() && self.coordinator.is_none() {
      return;
    }
    info!("正在关闭流水线");
    *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = false;

    drop(self.handle.shared.inbox.close());
    if let Some(worker) = self.worker.take() {
      if worker.join().is_err() {
        error!("工作线程异常退出");
      }
    }

    self.handle.shared.outbox.close();
    if let Some(coordinator) = self.coordinator.take() {
      if coordinator.join().is_err() {
        error!("协调线程异常退出");
      }
    }

    let stats = self.stats();
    info!(
      "流水线已关闭: 处理 {} 帧，覆盖 {} 帧，空闲释放 {} 帧，暂停丢弃 {} 帧，过期界面更新 {} 条",
      stats.processed, stats.superseded, stats.idle_released, stats.discarded, stats.stale_updates
    );
  }
}

impl Drop for FramePipeline {
  fn drop(&mut self) {
    self.shutdown();
  }
}
