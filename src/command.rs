// 该文件是 Xunjing （寻径） 项目的一部分。
// src/command.rs - 语音指令解析
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

const FIND_WORDS: [&str; 2] = ["find", "talaash"];
const FIND_FILLERS: [&str; 3] = ["find", "talaash", "karein"];
const TORCH_WORDS: [&str; 3] = ["torch", "light", "roshni"];
const PAUSE_WORDS: [&str; 3] = ["stop", "pause", "ruko"];
const RESUME_WORDS: [&str; 4] = ["start", "camera", "shuru", "resume"];
const GENERAL_WORDS: [&str; 2] = ["general", "scan"];

/// 用户指令，来自语音识别或界面按钮
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Find(String),
  Torch,
  Pause,
  Resume,
  General,
}

impl Command {
  /// 按子串匹配自由文本，顺序决定优先级（"find stop sign" 是寻找而不是暂停）
  pub fn parse(utterance: &str) -> Option<Command> {
    let text = utterance.trim().to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if has(&FIND_WORDS) {
      let target = FIND_FILLERS
        .iter()
        .fold(text.clone(), |acc, filler| acc.replace(filler, ""));
      let target = target.split_whitespace().collect::<Vec<_>>().join(" ");
      return (!target.is_empty()).then_some(Command::Find(target));
    }
    if has(&TORCH_WORDS) {
      return Some(Command::Torch);
    }
    if has(&PAUSE_WORDS) {
      return Some(Command::Pause);
    }
    if has(&RESUME_WORDS) {
      return Some(Command::Resume);
    }
    if has(&GENERAL_WORDS) {
      return Some(Command::General);
    }
    None
  }
}
