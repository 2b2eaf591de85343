// 该文件是 Xunjing （寻径） 项目的一部分。
// src/bin/guide.rs - 持续导引程序
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

use std::io::BufRead;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn};
use url::Url;

use xunjing::{
  FromUrl,
  command::Command,
  config::PipelineConfig,
  feedback::{FeedbackConfig, Language},
  input::InputWrapper,
  labels::Labels,
  mode::{ModeFilter, OperatingMode},
  model::{
    CoordinateScale, DecodeConfig, Detector, ModelError, ReplayModel, ReplayModelBuilder, Selection,
  },
  output::{Actuators, LogSpeaker, LogTorch, LogVibrator, OutputWrapper},
  pipeline::{FramePipeline, PipelineHandle, PipelineState},
  task::{ContinuousTask, Task},
  torch::TorchConfig,
};

/// Xunjing 导引程序参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型来源，例如 replay:///path/to/recording.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 image:///photo.jpg?repeat=0&fps=10 或 v4l:///dev/video0
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 叠加层输出，例如 log:// 或 folder:///tmp/records
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,

  /// 标签表：coco、rps 或每行一个标签的文件
  #[arg(long, default_value = "rps")]
  pub labels: String,
  /// 置信度阈值，分数需严格大于该值
  #[arg(long, default_value_t = 0.25)]
  pub confidence: f32,
  /// 设置后启用同类别 NMS，值为 IoU 阈值
  #[arg(long, value_name = "IOU")]
  pub nms: Option<f32>,
  /// NMS 之后最多保留的检测数
  #[arg(long, default_value_t = 10)]
  pub max_detections: usize,
  /// 框坐标尺度：auto、pixels 或 normalized
  #[arg(long, default_value = "auto")]
  pub scale: CoordinateScale,

  /// 以寻物模式启动并寻找该物体
  #[arg(long, value_name = "OBJECT")]
  pub find: Option<String>,
  /// 通用模式下只提示这些类别，逗号分隔
  #[arg(long, value_delimiter = ',')]
  pub hazards: Vec<String>,
  /// 播报语言：en 或 ur
  #[arg(long, default_value = "en")]
  pub language: Language,
  #[arg(long, default_value_t = xunjing::feedback::DEFAULT_SPEAK_INTERVAL_MS)]
  pub speak_interval: u64,
  #[arg(long, default_value_t = xunjing::feedback::DEFAULT_VIBRATE_INTERVAL_MS)]
  pub vibrate_interval: u64,

  #[arg(long, default_value_t = xunjing::torch::DEFAULT_LOW_THRESHOLD)]
  pub torch_low: u8,
  #[arg(long, default_value_t = xunjing::torch::DEFAULT_HIGH_THRESHOLD)]
  pub torch_high: u8,
  #[arg(long, default_value_t = xunjing::torch::DEFAULT_SAMPLE_INTERVAL_MS)]
  pub torch_interval: u64,
  #[arg(long, default_value_t = xunjing::torch::DEFAULT_SAMPLE_STRIDE)]
  pub torch_stride: usize,
  /// 设备带有闪光灯
  #[arg(long)]
  pub flash: bool,

  /// 以暂停状态启动
  #[arg(long)]
  pub paused: bool,
  /// 最大投递帧数，0 表示无限制
  #[arg(long, value_name = "FRAME_NUMBER", default_value_t = 0)]
  pub frame_number: usize,
}

impl Args {
  fn pipeline_config(&self) -> Result<PipelineConfig> {
    let selection = match self.nms {
      Some(iou_threshold) => Selection::Nms {
        iou_threshold,
        max_detections: self.max_detections,
      },
      None => Selection::Best,
    };
    let filter = if self.hazards.is_empty() {
      ModeFilter::default()
    } else {
      ModeFilter::with_allow_list(&self.hazards)
    };

    Ok(PipelineConfig {
      decode: DecodeConfig {
        confidence_threshold: self.confidence,
        selection,
        scale: self.scale,
      },
      feedback: FeedbackConfig {
        speak_interval_ms: self.speak_interval,
        vibrate_interval_ms: self.vibrate_interval,
        language: self.language,
        ..FeedbackConfig::default()
      },
      torch: TorchConfig::new(
        self.torch_low,
        self.torch_high,
        self.torch_interval,
        self.torch_stride,
      )?,
      filter,
      initial_state: if self.paused {
        PipelineState::Idle
      } else {
        PipelineState::Active
      },
      initial_mode: match &self.find {
        Some(target) => OperatingMode::finder(target),
        None => OperatingMode::General,
      },
    })
  }
}

/// 从标准输入逐行读取语音识别结果
fn listen_for_commands(handle: PipelineHandle) {
  let stdin = std::io::stdin();
  for line in stdin.lock().lines() {
    let Ok(line) = line else {
      break;
    };
    match Command::parse(&line) {
      Some(command) => handle.apply(command),
      None => debug!("未识别的命令: {}", line),
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型来源: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("叠加层输出: {}", args.output);

  let config = args.pipeline_config()?;
  let labels = Labels::from_spec(&args.labels)?;

  let mut model_unavailable = false;
  let detector = match ReplayModelBuilder::from_url(&args.model)?.build() {
    Ok(model) => Detector::new(model, config.decode, labels)?,
    Err(ModelError::Unavailable(reason)) => {
      warn!("模型不可用: {}", reason);
      model_unavailable = true;
      Detector::<ReplayModel>::unavailable()
    }
    Err(e) => return Err(e.into()),
  };

  let input = InputWrapper::from_url(&args.input)?;
  let overlay = OutputWrapper::from_url(&args.output)?;
  let actuators = Actuators::new(overlay, LogSpeaker, LogVibrator, LogTorch::new(args.flash));

  let mut pipeline = FramePipeline::builder(config, detector, actuators).start()?;
  let handle = pipeline.handle();
  if model_unavailable {
    handle.notify("Model unavailable", "ماڈل دستیاب نہیں ہے");
  }

  {
    let handle = handle.clone();
    std::thread::Builder::new()
      .name("xunjing-commands".to_string())
      .spawn(move || listen_for_commands(handle))?;
  }

  let frame_number = (args.frame_number > 0).then_some(args.frame_number);
  ContinuousTask::default()
    .with_frame_number(frame_number)
    .with_ctrlc()?
    .run_task(input, &handle)?;

  pipeline.shutdown();
  Ok(())
}
