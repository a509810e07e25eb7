//! 编码参数解析.
//!
//! 参数以有序的字符串键值对传入. 解析分两轮:
//! 1. 先找出 `preset` 与 `tune` (键名不区分大小写), 两者一起生效
//! 2. 再按顺序处理其余键值对, 不认识的键原样转交编码器的通用参数解析
//!
//! 任何单个参数解析失败都只记录日志, 不会使整个配置失败.

use encapp_core::{ColorFormat, Rational};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// 已知的预设名称
const PRESETS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// 已知的调优名称
const TUNES: &[&str] = &[
    "film",
    "animation",
    "grain",
    "stillimage",
    "psnr",
    "ssim",
    "fastdecode",
    "zerolatency",
];

/// 单个编码参数 (键值对)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderParam {
    /// 参数名
    pub key: String,
    /// 参数值
    pub value: String,
}

impl EncoderParam {
    /// 创建参数
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// 码率控制方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RateControl {
    /// 固定量化参数
    Cqp,
    /// 恒定质量因子
    #[default]
    Crf,
    /// 平均码率
    Abr,
}

impl RateControl {
    /// 从 `bitrate_mode` 参数值解析 (不区分大小写)
    pub fn from_mode(mode: &str) -> Option<Self> {
        match mode.to_ascii_lowercase().as_str() {
            "cq" | "cqp" => Some(Self::Cqp),
            "cbr" | "crf" => Some(Self::Crf),
            "vbr" | "abr" => Some(Self::Abr),
            _ => None,
        }
    }
}

impl std::fmt::Display for RateControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cqp => write!(f, "cqp"),
            Self::Crf => write!(f, "crf"),
            Self::Abr => write!(f, "abr"),
        }
    }
}

/// 编码器配置
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 输入颜色格式
    pub color_format: ColorFormat,
    /// 输入位深
    pub bit_depth: u32,
    /// 编码线程数
    pub threads: u32,
    /// 目标码率 (kbit/s)
    pub bitrate_kbps: Option<u32>,
    /// 码率控制方式
    pub rate_control: RateControl,
    /// 关键帧间隔 (帧), `None` 时由编码器决定
    pub keyint: Option<u32>,
    /// 帧率
    pub fps: Rational,
    /// 时间基
    pub time_base: Rational,
    /// 预设
    pub preset: Option<String>,
    /// 调优
    pub tune: Option<String>,
    /// 转交编码器通用解析的参数, 按首次出现顺序, 同名后值覆盖前值
    pub extra: Vec<(String, String)>,
}

impl EncoderConfig {
    /// 以默认值创建: 单线程, 30/1 帧率, 微秒时间基
    pub fn new(width: u32, height: u32, color_format: ColorFormat, bit_depth: u32) -> Self {
        Self {
            width,
            height,
            color_format,
            bit_depth,
            threads: 1,
            bitrate_kbps: None,
            rate_control: RateControl::default(),
            keyint: None,
            fps: Rational::new(30, 1),
            time_base: Rational::MICRO,
            preset: None,
            tune: None,
            extra: Vec::new(),
        }
    }

    /// 按参数列表创建
    pub fn from_params(
        params: &[EncoderParam],
        width: u32,
        height: u32,
        color_format: ColorFormat,
        bit_depth: u32,
    ) -> Self {
        let mut config = Self::new(width, height, color_format, bit_depth);
        config.apply(params);
        config
    }

    /// 在当前配置之上应用参数列表
    pub fn apply(&mut self, params: &[EncoderParam]) {
        self.apply_preset_and_tune(params);
        for param in params {
            self.apply_one(&param.key, &param.value);
        }
    }

    /// 查询转交参数的值
    pub fn extra_value(&self, key: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 一帧时长 (时间基单位)
    pub fn frame_duration(&self) -> i64 {
        self.time_base.frame_duration(self.fps)
    }

    fn apply_preset_and_tune(&mut self, params: &[EncoderParam]) {
        let find = |name: &str| {
            params
                .iter()
                .find(|p| p.key.eq_ignore_ascii_case(name))
                .map(|p| p.value.as_str())
        };
        let preset = find("preset");
        let tune = find("tune");
        if preset.is_none() && tune.is_none() {
            return;
        }

        if let Some(preset) = preset {
            info!("设置预设: {preset}");
        }
        if let Some(tune) = tune {
            info!("设置调优: {tune}");
        }

        let preset_ok = preset.is_none_or(|p| PRESETS.contains(&p.to_ascii_lowercase().as_str()));
        let tune_ok = tune.is_none_or(|t| TUNES.contains(&t.to_ascii_lowercase().as_str()));
        if !preset_ok || !tune_ok {
            warn!("预设/调优设置失败: preset={preset:?}, tune={tune:?}");
            return;
        }
        if let Some(preset) = preset {
            self.preset = Some(preset.to_ascii_lowercase());
        }
        if let Some(tune) = tune {
            self.tune = Some(tune.to_ascii_lowercase());
        }
    }

    fn apply_one(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("preset") || key.eq_ignore_ascii_case("tune") {
            return;
        }

        match key.to_ascii_lowercase().as_str() {
            "i_threads" => match value.trim().parse::<u32>() {
                Ok(threads) => self.threads = threads,
                Err(_) => warn!("线程数无法解析: {value}"),
            },
            "bitrate_mode" => match RateControl::from_mode(value) {
                Some(rc) => self.rate_control = rc,
                None => warn!("未知码率控制方式: {value}"),
            },
            "i_frame_interval" => match value.trim().parse::<i64>() {
                Ok(seconds) if seconds > 0 => {
                    let frames = seconds.saturating_mul(i64::from(self.fps.num));
                    self.keyint = Some(u32::try_from(frames).unwrap_or(u32::MAX));
                }
                _ => warn!("关键帧间隔无法解析: {value}"),
            },
            "bitrate" => match value.trim().parse::<u64>() {
                Ok(bps) => {
                    self.bitrate_kbps = Some(u32::try_from(bps / 1000).unwrap_or(u32::MAX));
                }
                Err(_) => warn!("码率无法解析: {value}"),
            },
            _ => {
                debug!("转交通用参数: {key}={value}");
                match self.extra.iter_mut().find(|(k, _)| k == key) {
                    Some(entry) => entry.1 = value.to_string(),
                    None => self.extra.push((key.to_string(), value.to_string())),
                }
            }
        }
    }
}
