// 该文件是 Xunjing （寻径） 项目的一部分。
// tests/pipeline.rs - 流水线集成测试
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
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
    mpsc::{self, Receiver, Sender},
  },
  time::{Duration, Instant},
};

use image::{Rgb, RgbImage};

use xunjing::{
  clock::ManualClock,
  command::Command,
  config::PipelineConfig,
  detection::Detection,
  feedback::Language,
  frame::Frame,
  labels::Labels,
  mode::OperatingMode,
  model::{DecodeConfig, Detector, InputTensor, Model, ModelError, RawTensor},
  output::{Actuators, Overlay, OutputError, Speaker, TorchControl, Vibrator},
  pipeline::{FramePipeline, PipelineState},
  task::{ContinuousTask, Task},
  torch::TorchConfig,
};

#[derive(Debug, Clone, PartialEq)]
enum Event {
  Overlay(Vec<String>),
  Speak(String),
  Vibrate(u64),
  Torch(bool),
}

#[derive(Clone, Default)]
struct Recorder {
  events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
  fn push(&self, event: Event) {
    self.events.lock().unwrap().push(event);
  }

  fn events(&self) -> Vec<Event> {
    self.events.lock().unwrap().clone()
  }

  fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
    self.events().iter().filter(|e| pred(e)).count()
  }

  fn overlays(&self) -> usize {
    self.count(|e| matches!(e, Event::Overlay(_)))
  }

  fn spoken(&self, text: &str) -> usize {
    self.count(|e| *e == Event::Speak(text.to_string()))
  }

  fn torch(&self) -> Vec<bool> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        Event::Torch(on) => Some(on),
        _ => None,
      })
      .collect()
  }
}

impl Overlay for Recorder {
  fn render(&self, detections: &[Detection]) -> Result<(), OutputError> {
    self.push(Event::Overlay(detections.iter().map(|d| d.label.clone()).collect()));
    Ok(())
  }
}

impl Speaker for Recorder {
  fn speak(&self, text: &str, _language: Language) {
    self.push(Event::Speak(text.to_string()));
  }
}

impl Vibrator for Recorder {
  fn vibrate(&self, duration_ms: u64) {
    self.push(Event::Vibrate(duration_ms));
  }
}

/// 每次渲染耗时固定时长的叠加层，模拟比推理更慢的界面
struct SlowOverlay {
  recorder: Recorder,
  delay: Duration,
}

impl Overlay for SlowOverlay {
  fn render(&self, detections: &[Detection]) -> Result<(), OutputError> {
    std::thread::sleep(self.delay);
    self.recorder.render(detections)
  }
}

struct RecordingTorch {
  recorder: Recorder,
  flash_unit: bool,
}

impl TorchControl for RecordingTorch {
  fn has_flash_unit(&self) -> bool {
    self.flash_unit
  }

  fn enable_torch(&self, on: bool) {
    self.recorder.push(Event::Torch(on));
  }
}

/// 每次推理都给出同一个 "Rock" 检测；可选地在推理中途等待放行信号
struct ScriptedModel {
  output: Vec<f32>,
  gate: Option<Mutex<Receiver<()>>>,
  entered: Option<Sender<()>>,
}

impl ScriptedModel {
  fn rock() -> Self {
    Self {
      output: vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.05, 0.05],
      gate: None,
      entered: None,
    }
  }

  /// 返回 (模型, 放行发送端, 进入推理接收端)
  fn gated() -> (Self, Sender<()>, Receiver<()>) {
    let (open_tx, open_rx) = mpsc::channel();
    let (entered_tx, entered_rx) = mpsc::channel();
    let model = Self {
      gate: Some(Mutex::new(open_rx)),
      entered: Some(entered_tx),
      ..Self::rock()
    };
    (model, open_tx, entered_rx)
  }
}

impl Model for ScriptedModel {
  type Error = ModelError;

  fn input_shape(&self) -> [usize; 4] {
    [1, 8, 8, 3]
  }

  fn output_shape(&self) -> [usize; 3] {
    [1, 7, 1]
  }

  fn infer(&self, _input: &InputTensor) -> Result<RawTensor, Self::Error> {
    if let Some(entered) = &self.entered {
      let _ = entered.send(());
    }
    if let Some(gate) = &self.gate {
      let _ = gate.lock().unwrap().recv();
    }
    RawTensor::new([1, 7, 1], self.output.clone()).map_err(|e| ModelError::Inference(e.to_string()))
  }
}

fn detector(model: ScriptedModel) -> Detector<ScriptedModel> {
  Detector::new(model, DecodeConfig::default(), Labels::rock_paper_scissors()).unwrap()
}

fn actuators(recorder: &Recorder, flash_unit: bool) -> Actuators {
  Actuators::new(
    recorder.clone(),
    recorder.clone(),
    recorder.clone(),
    RecordingTorch {
      recorder: recorder.clone(),
      flash_unit,
    },
  )
}

fn frame(index: u64, brightness: u8, released: &Arc<AtomicUsize>) -> Frame {
  let released = released.clone();
  let image = RgbImage::from_pixel(16, 16, Rgb([brightness, brightness, brightness]));
  Frame::from_rgb(image, index).on_release(move || {
    released.fetch_add(1, Ordering::SeqCst);
  })
}

fn wait_until(what: &str, cond: impl Fn() -> bool) {
  let deadline = Instant::now() + Duration::from_secs(5);
  while !cond() {
    assert!(Instant::now() < deadline, "timed out waiting for {}", what);
    std::thread::sleep(Duration::from_millis(2));
  }
}

#[test]
fn active_pipeline_announces_and_reports_detection() {
  let recorder = Recorder::default();
  let clock = ManualClock::new(10_000);
  let released = Arc::new(AtomicUsize::new(0));
  let mut pipeline = FramePipeline::builder(
    PipelineConfig::default(),
    detector(ScriptedModel::rock()),
    actuators(&recorder, false),
  )
  .clock(clock)
  .start()
  .unwrap();

  pipeline.submit(frame(0, 100, &released));
  wait_until("overlay", || recorder.overlays() == 1);

  assert_eq!(
    recorder.events(),
    vec![
      Event::Speak("Detection started".to_string()),
      Event::Speak("Caution, Rock".to_string()),
      Event::Vibrate(200),
      Event::Overlay(vec!["Rock".to_string()]),
    ]
  );
  assert_eq!(released.load(Ordering::SeqCst), 1);
  assert_eq!(pipeline.stats().processed, 1);
  pipeline.shutdown();
}

#[test]
fn speech_is_rate_limited_across_frames() {
  let recorder = Recorder::default();
  let clock = ManualClock::new(10_000);
  let released = Arc::new(AtomicUsize::new(0));
  let pipeline = FramePipeline::builder(
    PipelineConfig::default(),
    detector(ScriptedModel::rock()),
    actuators(&recorder, false),
  )
  .clock(clock.clone())
  .start()
  .unwrap();

  pipeline.submit(frame(0, 100, &released));
  wait_until("first frame", || recorder.overlays() == 1);
  clock.advance(1_000);
  pipeline.submit(frame(1, 100, &released));
  wait_until("second frame", || recorder.overlays() == 2);
  assert_eq!(recorder.spoken("Caution, Rock"), 1);
  assert_eq!(recorder.count(|e| matches!(e, Event::Vibrate(_))), 1);

  clock.advance(2_001);
  pipeline.submit(frame(2, 100, &released));
  wait_until("third frame", || recorder.overlays() == 3);
  assert_eq!(recorder.spoken("Caution, Rock"), 2);
  assert_eq!(recorder.count(|e| matches!(e, Event::Vibrate(_))), 2);
  drop(pipeline);
  assert_eq!(released.load(Ordering::SeqCst), 3);
}

#[test]
fn idle_pipeline_releases_frames_immediately() {
  let recorder = Recorder::default();
  let released = Arc::new(AtomicUsize::new(0));
  let config = PipelineConfig {
    initial_state: PipelineState::Idle,
    ..PipelineConfig::default()
  };
  let pipeline = FramePipeline::builder(
    config,
    detector(ScriptedModel::rock()),
    actuators(&recorder, true),
  )
  .start()
  .unwrap();

  for index in 0..5 {
    pipeline.submit(frame(index, 10, &released));
    assert_eq!(released.load(Ordering::SeqCst), index as usize + 1);
  }
  let stats = pipeline.stats();
  assert_eq!(stats.idle_released, 5);
  assert_eq!(stats.processed, 0);
  assert_eq!(recorder.overlays(), 0);
  assert!(recorder.torch().is_empty());
}

#[test]
fn newer_frames_supersede_pending_ones() {
  let recorder = Recorder::default();
  let released = Arc::new(AtomicUsize::new(0));
  let (model, open, entered) = ScriptedModel::gated();
  let pipeline = FramePipeline::builder(
    PipelineConfig::default(),
    detector(model),
    actuators(&recorder, false),
  )
  .start()
  .unwrap();

  pipeline.submit(frame(0, 100, &released));
  entered.recv().unwrap();

  pipeline.submit(frame(1, 100, &released));
  pipeline.submit(frame(2, 100, &released));
  assert_eq!(released.load(Ordering::SeqCst), 1);
  assert_eq!(pipeline.stats().superseded, 1);

  open.send(()).unwrap();
  entered.recv().unwrap();
  wait_until("first frame", || recorder.overlays() == 1);
  open.send(()).unwrap();
  wait_until("second frame", || recorder.overlays() == 2);
  assert_eq!(pipeline.stats().processed, 2);
  assert_eq!(released.load(Ordering::SeqCst), 3);
}

#[test]
fn pausing_mid_inference_discards_the_result() {
  let recorder = Recorder::default();
  let released = Arc::new(AtomicUsize::new(0));
  let (model, open, entered) = ScriptedModel::gated();
  let pipeline = FramePipeline::builder(
    PipelineConfig::default(),
    detector(model),
    actuators(&recorder, false),
  )
  .start()
  .unwrap();
  let handle = pipeline.handle();

  pipeline.submit(frame(0, 100, &released));
  entered.recv().unwrap();
  handle.pause();
  open.send(()).unwrap();

  wait_until("discard", || pipeline.stats().discarded == 1);
  wait_until("cleared overlay", || recorder.overlays() == 1);
  assert_eq!(recorder.events().last(), Some(&Event::Overlay(Vec::new())));
  assert_eq!(recorder.spoken("Caution, Rock"), 0);
  assert_eq!(released.load(Ordering::SeqCst), 1);
  assert_eq!(handle.state(), PipelineState::Idle);

  pipeline.submit(frame(1, 100, &released));
  assert_eq!(released.load(Ordering::SeqCst), 2);
}

#[test]
fn torch_follows_ambient_brightness() {
  let recorder = Recorder::default();
  let clock = ManualClock::new(10_000);
  let released = Arc::new(AtomicUsize::new(0));
  let config = PipelineConfig {
    torch: TorchConfig::new(50, 80, 2_000, 1).unwrap(),
    ..PipelineConfig::default()
  };
  let pipeline = FramePipeline::builder(
    config,
    detector(ScriptedModel::rock()),
    actuators(&recorder, true),
  )
  .clock(clock.clone())
  .start()
  .unwrap();

  pipeline.submit(frame(0, 30, &released));
  wait_until("dark frame", || recorder.overlays() == 1);
  assert_eq!(recorder.torch(), vec![true]);

  clock.advance(500);
  pipeline.submit(frame(1, 200, &released));
  wait_until("bright frame within interval", || recorder.overlays() == 2);
  assert_eq!(recorder.torch(), vec![true]);

  clock.advance(1_600);
  pipeline.submit(frame(2, 60, &released));
  wait_until("frame in dead band", || recorder.overlays() == 3);
  assert_eq!(recorder.torch(), vec![true]);

  clock.advance(2_100);
  pipeline.submit(frame(3, 200, &released));
  wait_until("bright frame", || recorder.overlays() == 4);
  assert_eq!(recorder.torch(), vec![true, false]);
}

#[test]
fn missing_flash_unit_never_drives_torch() {
  let recorder = Recorder::default();
  let released = Arc::new(AtomicUsize::new(0));
  let pipeline = FramePipeline::builder(
    PipelineConfig::default(),
    detector(ScriptedModel::rock()),
    actuators(&recorder, false),
  )
  .start()
  .unwrap();

  pipeline.handle().apply(Command::Torch);
  pipeline.submit(frame(0, 0, &released));
  wait_until("dark frame", || recorder.overlays() == 1);
  assert!(recorder.torch().is_empty());
}

#[test]
fn voice_commands_drive_mode_and_state() {
  let recorder = Recorder::default();
  let clock = ManualClock::new(10_000);
  let released = Arc::new(AtomicUsize::new(0));
  let pipeline = FramePipeline::builder(
    PipelineConfig::default(),
    detector(ScriptedModel::rock()),
    actuators(&recorder, false),
  )
  .clock(clock.clone())
  .start()
  .unwrap();
  let handle = pipeline.handle();

  handle.apply(Command::parse("find paper").unwrap());
  assert_eq!(handle.mode(), OperatingMode::finder("paper"));
  pipeline.submit(frame(0, 100, &released));
  wait_until("filtered frame", || recorder.overlays() == 1);
  assert_eq!(recorder.events().last(), Some(&Event::Overlay(Vec::new())));
  assert_eq!(recorder.spoken("Searching"), 1);

  handle.apply(Command::parse("talaash rock karein").unwrap());
  pipeline.submit(frame(1, 100, &released));
  wait_until("matching frame", || recorder.overlays() == 2);
  assert_eq!(recorder.spoken("Rock found"), 1);

  handle.apply(Command::parse("stop").unwrap());
  assert_eq!(handle.state(), PipelineState::Idle);
  handle.apply(Command::parse("start camera").unwrap());
  assert_eq!(handle.state(), PipelineState::Active);
  assert_eq!(handle.mode(), OperatingMode::finder("rock"));
}

#[test]
fn nothing_is_actuated_after_shutdown() {
  let recorder = Recorder::default();
  let released = Arc::new(AtomicUsize::new(0));
  let (model, open, entered) = ScriptedModel::gated();
  let mut pipeline = FramePipeline::builder(
    PipelineConfig::default(),
    detector(model),
    actuators(&recorder, false),
  )
  .start()
  .unwrap();
  let handle = pipeline.handle();

  wait_until("greeting", || recorder.spoken("Detection started") == 1);
  pipeline.submit(frame(0, 100, &released));
  entered.recv().unwrap();

  let opener = std::thread::spawn(move || {
    std::thread::sleep(Duration::from_millis(50));
    let _ = open.send(());
  });
  pipeline.shutdown();
  opener.join().unwrap();

  let after = recorder.events();
  assert_eq!(after, vec![Event::Speak("Detection started".to_string())]);
  assert_eq!(released.load(Ordering::SeqCst), 1);

  handle.notify("late", "late");
  handle.submit(frame(1, 100, &released));
  pipeline.shutdown();
  assert_eq!(released.load(Ordering::SeqCst), 2);
  assert_eq!(recorder.events(), after);
}

#[cfg(feature = "read_image_file")]
#[test]
fn finite_input_is_fully_processed_before_shutdown() {
  use xunjing::input::ImageFileInput;

  let recorder = Recorder::default();
  let mut pipeline = FramePipeline::builder(
    PipelineConfig::default(),
    detector(ScriptedModel::rock()),
    actuators(&recorder, false),
  )
  .clock(ManualClock::new(10_000))
  .start()
  .unwrap();
  let handle = pipeline.handle();

  let image = RgbImage::from_pixel(16, 16, Rgb([100, 100, 100]));
  let input = ImageFileInput::from_image(image, 1, None);
  ContinuousTask::default().run_task(input, &handle).unwrap();
  pipeline.shutdown();

  assert_eq!(
    recorder.events(),
    vec![
      Event::Speak("Detection started".to_string()),
      Event::Speak("Caution, Rock".to_string()),
      Event::Vibrate(200),
      Event::Overlay(vec!["Rock".to_string()]),
    ]
  );
  assert_eq!(pipeline.stats().processed, 1);
}

#[test]
fn slow_overlay_does_not_build_a_backlog() {
  let recorder = Recorder::default();
  let released = Arc::new(AtomicUsize::new(0));
  let actuators = Actuators::new(
    SlowOverlay {
      recorder: recorder.clone(),
      delay: Duration::from_millis(40),
    },
    recorder.clone(),
    recorder.clone(),
    RecordingTorch {
      recorder: recorder.clone(),
      flash_unit: false,
    },
  );
  let pipeline = FramePipeline::builder(
    PipelineConfig::default(),
    detector(ScriptedModel::rock()),
    actuators,
  )
  .clock(ManualClock::new(10_000))
  .start()
  .unwrap();

  for index in 0..60 {
    pipeline.submit(frame(index, 100, &released));
    std::thread::sleep(Duration::from_millis(5));
  }
  let last_submit = Instant::now();
  pipeline.drain();
  let lag = last_submit.elapsed();

  assert!(lag < Duration::from_secs(1), "overlay lagged {:?} behind input", lag);
  let stats = pipeline.stats();
  assert!(stats.stale_updates > 0);
  assert!(recorder.overlays() < stats.processed as usize);
  assert_eq!(
    recorder.events().last(),
    Some(&Event::Overlay(vec!["Rock".to_string()]))
  );
  assert_eq!(released.load(Ordering::SeqCst), 60);
}
