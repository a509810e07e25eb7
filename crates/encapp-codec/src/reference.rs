//! 参考编码器.
//!
//! 纯 Rust 的确定性编码器后端, 没有链接原生编码器时使用. 不做任何压缩,
//! 只产出结构上符合 H.264 的码流:
//! - 头部: SPS + PPS + SEI, 可选 AUD
//! - 关键帧前重复头部 (`repeat-headers`, 默认开启)
//! - Annex B 起始码或 4 字节大端长度前缀 (`annexb`, 默认开启)
//! - 先进先出延迟 `bframes` 帧, 模拟 B 帧前瞻
//!
//! 切片 RBSP (NAL 头之后, 插入防竞争字节之前):
//! ```text
//! frame_num(u32 BE) | pts(i64 BE) | luma_checksum(u32 BE) | 0x80
//! ```

use std::collections::VecDeque;

use byteorder::{BigEndian, WriteBytesExt};
use encapp_core::{ColorFormat, EncappError, EncappResult};
use log::{debug, error, warn};

use crate::backend::{EncodeResult, EncoderBackend, OutputPicture};
use crate::nal::{NalUnit, NalUnitType, START_CODE, add_emulation_prevention};
use crate::params::EncoderConfig;
use crate::picture::Picture;

/// 默认关键帧间隔
const DEFAULT_KEYINT: u32 = 250;
/// 前瞻延迟上限
const MAX_BFRAMES: usize = 16;
/// SEI user_data_unregistered 的 UUID
const SEI_UUID: [u8; 16] = [
    0xDC, 0x45, 0xE9, 0xBD, 0xE6, 0xD9, 0x48, 0xB7, 0x96, 0x2C, 0xD8, 0x20, 0xD9, 0x23, 0xEE, 0xEF,
];
/// SEI 中携带的编码器标识
const SEI_TEXT: &[u8] = b"encapp reference encoder";

/// 通用参数解析出的码流设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StreamSettings {
    bframes: usize,
    keyint: u32,
    annexb: bool,
    repeat_headers: bool,
    aud: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            bframes: 0,
            keyint: DEFAULT_KEYINT,
            annexb: true,
            repeat_headers: true,
            aud: false,
        }
    }
}

impl StreamSettings {
    fn from_config(config: &EncoderConfig) -> Self {
        let mut settings = Self::default();
        if let Some(keyint) = config.keyint {
            settings.keyint = keyint.max(1);
        }
        for (key, value) in &config.extra {
            if let Err(reason) = settings.parse_generic(key, value) {
                warn!("参数被拒绝: {key}={value}, {reason}");
            }
        }
        settings
    }

    fn parse_generic(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "bframes" => {
                let n = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| format!("无法解析为整数: {value}"))?;
                if n > MAX_BFRAMES {
                    return Err(format!("超出上限 {MAX_BFRAMES}"));
                }
                self.bframes = n;
            }
            "keyint" => {
                let n = value
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| format!("无法解析为整数: {value}"))?;
                if n == 0 {
                    return Err("关键帧间隔必须大于 0".into());
                }
                self.keyint = n;
            }
            "annexb" => self.annexb = parse_flag(value)?,
            "repeat-headers" => self.repeat_headers = parse_flag(value)?,
            "aud" => self.aud = parse_flag(value)?,
            _ => return Err("不支持的参数".into()),
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(format!("无法解析为布尔值: {value}")),
    }
}

/// 等待输出的帧
#[derive(Debug, Clone, Copy)]
struct PendingFrame {
    frame_num: u32,
    pts: i64,
    is_keyframe: bool,
    checksum: u32,
}

/// 参考编码器
pub struct ReferenceEncoder {
    config: EncoderConfig,
    settings: StreamSettings,
    queue: VecDeque<PendingFrame>,
    /// 已接收的输入帧数
    frames_in: u32,
}

impl ReferenceEncoder {
    /// 按配置打开
    pub fn open(config: &EncoderConfig) -> EncappResult<Self> {
        validate_geometry(config)?;
        if !config.fps.is_valid() || config.fps.num <= 0 {
            return Err(EncappError::OpenFailed(format!("帧率非法: {}", config.fps)));
        }
        if !config.time_base.is_valid() || config.time_base.num <= 0 {
            return Err(EncappError::OpenFailed(format!(
                "时间基非法: {}",
                config.time_base
            )));
        }

        let settings = StreamSettings::from_config(config);
        debug!(
            "参考编码器已打开: {}x{} {} {}bit, bframes={}, keyint={}, annexb={}",
            config.width,
            config.height,
            config.color_format,
            config.bit_depth,
            settings.bframes,
            settings.keyint,
            settings.annexb,
        );
        Ok(Self {
            config: config.clone(),
            settings,
            queue: VecDeque::with_capacity(settings.bframes + 1),
            frames_in: 0,
        })
    }

    /// 满足 [`BackendFactory`](crate::backend::BackendFactory) 签名的打开函数
    pub fn open_boxed(config: &EncoderConfig) -> EncappResult<Box<dyn EncoderBackend>> {
        Ok(Box::new(Self::open(config)?))
    }

    /// 插入防竞争字节后加上起始码或长度前缀
    fn frame(&self, nal_type: NalUnitType, rbsp: &[u8]) -> NalUnit {
        let body = add_emulation_prevention(rbsp);
        let mut out = Vec::with_capacity(START_CODE.len() + body.len());
        if self.settings.annexb {
            out.extend_from_slice(&START_CODE);
        } else {
            // Vec 写入不会失败
            let _ = out.write_u32::<BigEndian>(body.len() as u32);
        }
        out.extend_from_slice(&body);
        NalUnit::new(nal_type, out)
    }

    fn header_units(&self) -> Vec<NalUnit> {
        vec![
            self.frame(NalUnitType::Sps, &self.sps_body()),
            self.frame(NalUnitType::Pps, &[0x68, 0xCE, 0x3C, 0x80]),
            self.frame(NalUnitType::Sei, &sei_body()),
        ]
    }

    fn sps_body(&self) -> Vec<u8> {
        let profile_idc = if self.config.bit_depth > 8 {
            110
        } else if self.settings.bframes > 0 {
            100
        } else {
            66
        };
        let pixels = u64::from(self.config.width) * u64::from(self.config.height);
        let level_idc = match pixels {
            0..=414_720 => 30,
            414_721..=2_097_152 => 40,
            _ => 51,
        };

        let mut body = vec![0x67, profile_idc, 0x00, level_idc];
        let _ = body.write_u16::<BigEndian>(clamp_u16(self.config.width));
        let _ = body.write_u16::<BigEndian>(clamp_u16(self.config.height));
        body.push(self.config.bit_depth as u8);
        body.push(0x80);
        body
    }

    fn slice_unit(&self, frame: &PendingFrame) -> NalUnit {
        let (nal_type, header) = if frame.is_keyframe {
            (NalUnitType::SliceIdr, 0x65)
        } else {
            (NalUnitType::Slice, 0x41)
        };
        let mut body = Vec::with_capacity(18);
        body.push(header);
        let _ = body.write_u32::<BigEndian>(frame.frame_num);
        let _ = body.write_i64::<BigEndian>(frame.pts);
        let _ = body.write_u32::<BigEndian>(frame.checksum);
        body.push(0x80);
        self.frame(nal_type, &body)
    }

    fn emit(&self, frame: PendingFrame) -> EncodeResult {
        let mut nals = Vec::with_capacity(5);
        if self.settings.aud {
            nals.push(self.frame(NalUnitType::Aud, &[0x09, 0xF0]));
        }
        if frame.is_keyframe && self.settings.repeat_headers {
            nals.extend(self.header_units());
        }
        nals.push(self.slice_unit(&frame));

        let total: usize = nals.iter().map(NalUnit::len).sum();
        EncodeResult {
            nals,
            picture: OutputPicture {
                pts: frame.pts,
                dts: frame.pts,
                is_keyframe: frame.is_keyframe,
            },
            status: i32::try_from(total).unwrap_or(i32::MAX),
        }
    }

    fn accept(&mut self, picture: &Picture) -> EncappResult<()> {
        if picture.width != self.config.width
            || picture.height != self.config.height
            || picture.color_format != self.config.color_format
        {
            return Err(EncappError::InvalidArgument(format!(
                "图像与配置不一致: {}x{} {}, 期望 {}x{} {}",
                picture.width,
                picture.height,
                picture.color_format,
                self.config.width,
                self.config.height,
                self.config.color_format
            )));
        }

        let frame_num = self.frames_in;
        let checksum = picture
            .luma()
            .iter()
            .fold(0u32, |acc, &b| acc.wrapping_add(u32::from(b)));
        self.queue.push_back(PendingFrame {
            frame_num,
            pts: picture.pts,
            is_keyframe: frame_num % self.settings.keyint == 0,
            checksum,
        });
        self.frames_in = self.frames_in.wrapping_add(1);
        Ok(())
    }
}

impl EncoderBackend for ReferenceEncoder {
    fn name(&self) -> &str {
        "reference"
    }

    fn headers(&mut self) -> EncappResult<Vec<NalUnit>> {
        let mut nals = Vec::with_capacity(4);
        if self.settings.aud {
            nals.push(self.frame(NalUnitType::Aud, &[0x09, 0xF0]));
        }
        nals.extend(self.header_units());
        Ok(nals)
    }

    fn encode(&mut self, picture: Option<&Picture>) -> EncodeResult {
        match picture {
            Some(picture) => {
                if let Err(e) = self.accept(picture) {
                    error!("参考编码器拒绝输入: {e}");
                    return EncodeResult::failed(-1);
                }
                if self.queue.len() > self.settings.bframes {
                    match self.queue.pop_front() {
                        Some(frame) => self.emit(frame),
                        None => EncodeResult::default(),
                    }
                } else {
                    EncodeResult::default()
                }
            }
            None => match self.queue.pop_front() {
                Some(frame) => self.emit(frame),
                None => EncodeResult::default(),
            },
        }
    }

    fn reconfigure(&mut self, config: &EncoderConfig) -> i32 {
        if config.width != self.config.width
            || config.height != self.config.height
            || config.color_format != self.config.color_format
            || config.bit_depth != self.config.bit_depth
        {
            error!("重新配置不允许修改分辨率或输入格式");
            return -1;
        }

        let mut settings = StreamSettings::from_config(config);
        if settings.bframes != self.settings.bframes {
            warn!(
                "前瞻延迟不支持运行时修改, 保持 bframes={}",
                self.settings.bframes
            );
            settings.bframes = self.settings.bframes;
        }
        self.settings = settings;
        self.config = config.clone();
        debug!(
            "参考编码器重新配置: keyint={}, annexb={}, aud={}",
            settings.keyint, settings.annexb, settings.aud
        );
        0
    }

    fn delayed_frames(&self) -> usize {
        self.queue.len()
    }

    fn parameters(&self) -> Vec<(String, String)> {
        let c = &self.config;
        let s = &self.settings;
        [
            ("i_frame_reference", "1".to_string()),
            ("i_bframe", s.bframes.to_string()),
            ("i_keyint_max", s.keyint.to_string()),
            ("rc.i_rc_method", c.rate_control.to_string()),
            (
                "rc.i_bitrate",
                c.bitrate_kbps.map_or_else(|| "0".to_string(), |b| b.to_string()),
            ),
            ("i_threads", c.threads.to_string()),
            ("i_fps_num", c.fps.num.to_string()),
            ("i_fps_den", c.fps.den.to_string()),
            ("i_timebase_num", c.time_base.num.to_string()),
            ("i_timebase_den", c.time_base.den.to_string()),
            ("b_annexb", u8::from(s.annexb).to_string()),
            ("b_repeat_headers", u8::from(s.repeat_headers).to_string()),
            ("b_aud", u8::from(s.aud).to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

fn validate_geometry(config: &EncoderConfig) -> EncappResult<()> {
    config
        .color_format
        .plane_layout(config.width, config.height, config.bit_depth)
        .map_err(|e| EncappError::OpenFailed(e.to_string()))?;
    let subsampled = matches!(
        config.color_format,
        ColorFormat::I420 | ColorFormat::Nv12 | ColorFormat::Nv21
    );
    if subsampled && (config.width % 2 != 0 || config.height % 2 != 0) {
        return Err(EncappError::OpenFailed(format!(
            "4:2:0 输入要求偶数分辨率: {}x{}",
            config.width, config.height
        )));
    }
    Ok(())
}

fn sei_body() -> Vec<u8> {
    let payload_len = SEI_UUID.len() + SEI_TEXT.len();
    let mut body = Vec::with_capacity(payload_len + 4);
    body.push(0x06);
    // payload_type = 5 (user_data_unregistered)
    body.push(0x05);
    body.push(payload_len as u8);
    body.extend_from_slice(&SEI_UUID);
    body.extend_from_slice(SEI_TEXT);
    body.push(0x80);
    body
}

fn clamp_u16(v: u32) -> u16 {
    u16::try_from(v).unwrap_or(u16::MAX)
}
