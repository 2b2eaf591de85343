// 该文件是 Xunjing （寻径） 项目的一部分。
// src/bin/decode_oneshot.rs - 单帧检测程序
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use xunjing::{
  FromUrl,
  input::InputWrapper,
  labels::Labels,
  mode::{ModeFilter, OperatingMode},
  model::{CoordinateScale, DecodeConfig, Detector, ReplayModelBuilder, Selection},
  output::OutputWrapper,
  task::{OneShotTask, Task},
};

/// 对一帧图像做一次检测并输出结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型来源，例如 replay:///path/to/recording.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 image:///photo.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出，例如 log:// 或 folder:///tmp/records?always
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,
  #[arg(long, default_value = "rps")]
  pub labels: String,
  #[arg(long, default_value_t = 0.25)]
  pub confidence: f32,
  /// 设置后启用同类别 NMS，值为 IoU 阈值
  #[arg(long, value_name = "IOU")]
  pub nms: Option<f32>,
  #[arg(long, default_value = "auto")]
  pub scale: CoordinateScale,
  /// 只保留该物体
  #[arg(long, value_name = "OBJECT")]
  pub find: Option<String>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型来源: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出: {}", args.output);

  let config = DecodeConfig {
    confidence_threshold: args.confidence,
    selection: match args.nms {
      Some(iou_threshold) => Selection::Nms {
        iou_threshold,
        max_detections: 100,
      },
      None => Selection::Best,
    },
    scale: args.scale,
  };
  let labels = Labels::from_spec(&args.labels)?;
  let model = ReplayModelBuilder::from_url(&args.model)?.build()?;
  let detector = Detector::new(model, config, labels)?;

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let mode = match &args.find {
    Some(target) => OperatingMode::finder(target),
    None => OperatingMode::General,
  };
  OneShotTask::new(mode, ModeFilter::default()).run_task(input, (&detector, &output))?;

  Ok(())
}
