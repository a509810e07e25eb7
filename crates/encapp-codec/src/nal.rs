//! H.264 NAL (Network Abstraction Layer) 单元模型.
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌─────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────────┘
//! ```
//!
//! 重打包只看类型标签, 不解析负载. 这里同时提供 Annex B 起始码分割,
//! 供容器层从头部数据块中取出 SPS/PPS, 以及检测关键帧.

use bytes::Bytes;
use encapp_core::{EncappError, EncappResult};

/// Annex B 4 字节起始码
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum NalUnitType {
    /// 非 IDR 图像切片 (P/B slice)
    Slice,
    /// 数据分区 A (DPA)
    SliceDpa,
    /// 数据分区 B (DPB)
    SliceDpb,
    /// 数据分区 C (DPC)
    SliceDpc,
    /// IDR 图像切片 (关键帧)
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    FillerData,
    /// SPS 扩展
    SpsExtension,
    /// 未知类型
    Unknown(u8),
}

/// NAL 单元的两类划分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalClass {
    /// 码流元数据, 在会话开始时带外交付
    Header,
    /// 编码图像数据 (以及其余所有类型)
    Slice,
}

impl NalUnitType {
    /// 从 NAL 类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2 => Self::SliceDpa,
            3 => Self::SliceDpb,
            4 => Self::SliceDpc,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            13 => Self::SpsExtension,
            _ => Self::Unknown(type_id),
        }
    }

    /// 从 NAL 头部字节创建 (取低 5 位)
    pub fn from_header_byte(header: u8) -> Self {
        Self::from_type_id(header & 0x1F)
    }

    /// 获取类型编号
    pub fn type_id(&self) -> u8 {
        match self {
            Self::Slice => 1,
            Self::SliceDpa => 2,
            Self::SliceDpb => 3,
            Self::SliceDpc => 4,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::EndOfSequence => 10,
            Self::EndOfStream => 11,
            Self::FillerData => 12,
            Self::SpsExtension => 13,
            Self::Unknown(id) => *id,
        }
    }

    /// 分类: 纯粹按类型标签查表
    pub fn class(&self) -> NalClass {
        match self {
            Self::Sps | Self::Pps | Self::Sei | Self::Aud | Self::FillerData => NalClass::Header,
            _ => NalClass::Slice,
        }
    }

    /// 是否为头部类
    pub fn is_header(&self) -> bool {
        self.class() == NalClass::Header
    }

    /// 是否为关键帧 (IDR)
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::SliceIdr)
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SliceDpa => write!(f, "SliceDPA"),
            Self::SliceDpb => write!(f, "SliceDPB"),
            Self::SliceDpc => write!(f, "SliceDPC"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSeq"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::FillerData => write!(f, "Filler"),
            Self::SpsExtension => write!(f, "SPSExt"),
            Self::Unknown(id) => write!(f, "Unknown({id})"),
        }
    }
}

/// 编码器产出的 NAL 单元
///
/// `payload` 是编码器原样输出的字节, 可能带起始码或长度前缀.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NalUnit {
    /// NAL 单元类型
    pub nal_type: NalUnitType,
    /// 负载数据
    pub payload: Bytes,
}

impl NalUnit {
    /// 创建 NAL 单元
    pub fn new(nal_type: NalUnitType, payload: impl Into<Bytes>) -> Self {
        Self {
            nal_type,
            payload: payload.into(),
        }
    }

    /// 负载长度 (字节)
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// 负载是否为空
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// 所属分类
    pub fn class(&self) -> NalClass {
        self.nal_type.class()
    }
}

/// 容器层需要的参数集 (各自带 4 字节起始码)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSets {
    /// 第一个 SPS
    pub sps: Vec<u8>,
    /// 第一个 PPS
    pub pps: Vec<u8>,
}

/// 从 Annex B 字节流中分割出所有 NAL 单元
///
/// 支持 3 字节 (00 00 01) 和 4 字节 (00 00 00 01) 起始码.
/// 返回的负载不含起始码.
pub fn split_annex_b(data: &[u8]) -> Vec<NalUnit> {
    let offsets = find_start_codes(data);
    let mut nalus = Vec::with_capacity(offsets.len());

    for (i, &start) in offsets.iter().enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(data.len());
        let nal_start = skip_start_code(data, start);
        if nal_start >= end {
            continue;
        }

        // 去除尾部的 0 字节 (属于下一个 4 字节起始码)
        let mut nal_end = end;
        while nal_end > nal_start && data[nal_end - 1] == 0x00 {
            nal_end -= 1;
        }
        if nal_end <= nal_start {
            continue;
        }

        let header = data[nal_start];
        if header & 0x80 != 0 {
            log::debug!("跳过 forbidden_zero_bit 非法的 NAL, offset={nal_start}");
            continue;
        }
        nalus.push(NalUnit::new(
            NalUnitType::from_header_byte(header),
            Bytes::copy_from_slice(&data[nal_start..nal_end]),
        ));
    }

    nalus
}

/// 从头部数据块中取出第一个 SPS 和第一个 PPS
pub fn split_parameter_sets(header_blob: &[u8]) -> EncappResult<ParameterSets> {
    let nalus = split_annex_b(header_blob);
    let find = |wanted: NalUnitType| {
        nalus.iter().find(|n| n.nal_type == wanted).map(|n| {
            let mut out = Vec::with_capacity(START_CODE.len() + n.len());
            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(&n.payload);
            out
        })
    };

    let sps = find(NalUnitType::Sps)
        .ok_or_else(|| EncappError::InvalidArgument("头部数据中没有 SPS".into()))?;
    let pps = find(NalUnitType::Pps)
        .ok_or_else(|| EncappError::InvalidArgument("头部数据中没有 PPS".into()))?;
    Ok(ParameterSets { sps, pps })
}

/// 码流中是否包含 IDR 切片
pub fn contains_idr(bitstream: &[u8]) -> bool {
    split_annex_b(bitstream)
        .iter()
        .any(|n| n.nal_type.is_idr())
}

/// 插入防竞争字节 (0x00 0x00 0x0X → 0x00 0x00 0x03 0x0X, X <= 3)
///
/// 保证 NAL 负载中不会出现与起始码混淆的字节序列.
pub fn add_emulation_prevention(rbsp: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rbsp.len() + rbsp.len() / 64 + 1);
    let mut zeros = 0;
    for &b in rbsp {
        if zeros >= 2 && b <= 0x03 {
            out.push(0x03);
            zeros = 0;
        }
        out.push(b);
        zeros = if b == 0x00 { zeros + 1 } else { 0 };
    }
    out
}

/// 移除防竞争字节 (0x00 0x00 0x03 → 0x00 0x00)
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let is_emulation_prevention =
            i + 2 < data.len() && data[i] == 0x00 && data[i + 1] == 0x00 && data[i + 2] == 0x03;
        if is_emulation_prevention {
            rbsp.push(0x00);
            rbsp.push(0x00);
            i += 3;
        } else {
            rbsp.push(data[i]);
            i += 1;
        }
    }

    rbsp
}

// ============================================================
// 内部工具函数
// ============================================================

/// 查找所有起始码的位置
fn find_start_codes(data: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut i = 0;

    while i + 2 < data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 {
            if data[i + 2] == 0x01 {
                positions.push(i);
                i += 3;
                continue;
            } else if i + 3 < data.len() && data[i + 2] == 0x00 && data[i + 3] == 0x01 {
                positions.push(i);
                i += 4;
                continue;
            }
        }
        i += 1;
    }

    positions
}

/// 跳过起始码, 返回 NAL 数据的起始位置
fn skip_start_code(data: &[u8], pos: usize) -> usize {
    if data[pos..].starts_with(&START_CODE) {
        pos + 4
    } else if data[pos..].starts_with(&START_CODE[1..]) {
        pos + 3
    } else {
        pos
    }
}
