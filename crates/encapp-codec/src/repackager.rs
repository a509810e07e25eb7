//! NAL 单元重打包.
//!
//! 把编码器单次调用产出的 NAL 序列写入调用方的定长输出缓冲区:
//! - 头部类单元 (SPS/PPS/SEI/AUD/填充) 只通过 [`extract_headers`] 交付一次,
//!   每帧输出中一律剔除
//! - 切片类单元按产出顺序首尾相接, 起始偏移由 [`OutputMode`] 决定
//!
//! 每次拷贝前检查 `offset + len <= capacity`. 放不下的单元被丢弃并计入
//! [`RepackOutcome::dropped_units`], 其余单元继续处理, 绝不越界写入.

use bytes::{Bytes, BytesMut};
use encapp_core::{EncappError, EncappResult};
use log::{trace, warn};

use crate::nal::NalUnit;

/// 每帧输出模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputMode {
    /// 偏移 0 处写入 2 字节零值占位 (下游封装层约定), 切片从偏移 2 开始
    #[default]
    Prefixed,
    /// 不写占位, 编码器自带的起始码原样保留, 切片从偏移 0 开始
    AnnexB,
}

impl OutputMode {
    /// 前缀长度 (字节)
    pub const fn prefix_len(self) -> usize {
        match self {
            Self::Prefixed => 2,
            Self::AnnexB => 0,
        }
    }

    /// 从 C 层的整数编号解析: 0 = Prefixed, 1 = AnnexB
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Prefixed),
            1 => Some(Self::AnnexB),
            _ => None,
        }
    }
}

/// 单帧重打包结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepackOutcome {
    /// 写入的总字节数 (含前缀)
    pub bytes_written: usize,
    /// 其中切片负载的字节数
    pub slice_bytes: usize,
    /// 写入的切片单元数
    pub written_units: usize,
    /// 因容量不足被丢弃的切片单元数
    pub dropped_units: usize,
    /// 前缀本身是否因容量不足未能写入
    pub prefix_dropped: bool,
}

impl RepackOutcome {
    /// 结果是否被截断 (有数据因容量不足而丢弃)
    pub fn is_truncated(&self) -> bool {
        self.dropped_units > 0 || self.prefix_dropped
    }

    /// 是否写入了切片负载
    pub fn has_payload(&self) -> bool {
        self.slice_bytes > 0
    }
}

/// 提取头部类单元, 按产出顺序拼接为恰好等长的数据块
pub fn extract_headers(nals: &[NalUnit]) -> Bytes {
    let total: usize = header_units(nals).map(NalUnit::len).sum();
    let mut out = BytesMut::with_capacity(total);
    for nal in header_units(nals) {
        out.extend_from_slice(&nal.payload);
    }
    out.freeze()
}

/// 把头部类单元写入调用方缓冲区, 返回写入字节数
///
/// 遇到放不下的单元时在写入它之前返回 `CapacityOverflow`.
pub fn extract_headers_into(nals: &[NalUnit], out: &mut [u8]) -> EncappResult<usize> {
    let mut offset = 0;
    for nal in header_units(nals) {
        let end = offset + nal.len();
        if end > out.len() {
            return Err(EncappError::CapacityOverflow {
                needed: header_units(nals).map(NalUnit::len).sum(),
                capacity: out.len(),
            });
        }
        out[offset..end].copy_from_slice(&nal.payload);
        offset = end;
    }
    Ok(offset)
}

/// 把切片类单元写入定长输出缓冲区
pub fn repackage_frame(nals: &[NalUnit], out: &mut [u8], mode: OutputMode) -> RepackOutcome {
    let capacity = out.len();
    let prefix_len = mode.prefix_len();
    let mut outcome = RepackOutcome::default();

    if prefix_len > capacity {
        // 前缀放不下时偏移约定无法成立, 所有切片一并丢弃
        outcome.prefix_dropped = true;
        outcome.dropped_units = slice_units(nals).count();
        warn!(
            "输出缓冲区容量 {} 小于前缀长度 {}, 丢弃 {} 个切片单元",
            capacity, prefix_len, outcome.dropped_units
        );
        return outcome;
    }

    out[..prefix_len].fill(0);
    let mut offset = prefix_len;

    for nal in slice_units(nals) {
        let end = offset + nal.len();
        if end > capacity {
            outcome.dropped_units += 1;
            warn!(
                "输出缓冲区容量不足, 丢弃 {} 单元: offset={}, len={}, capacity={}",
                nal.nal_type,
                offset,
                nal.len(),
                capacity
            );
            continue;
        }
        out[offset..end].copy_from_slice(&nal.payload);
        trace!("写入 {} 单元: offset={}, len={}", nal.nal_type, offset, nal.len());
        offset = end;
        outcome.written_units += 1;
    }

    outcome.bytes_written = offset;
    outcome.slice_bytes = offset - prefix_len;
    outcome
}

/// 切片类负载的总长度 (不含前缀)
pub fn slice_payload_len(nals: &[NalUnit]) -> usize {
    slice_units(nals).map(NalUnit::len).sum()
}

fn header_units(nals: &[NalUnit]) -> impl Iterator<Item = &NalUnit> {
    nals.iter().filter(|n| n.nal_type.is_header())
}

fn slice_units(nals: &[NalUnit]) -> impl Iterator<Item = &NalUnit> {
    nals.iter().filter(|n| !n.nal_type.is_header())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nal::NalUnitType;

    fn unit(nal_type: NalUnitType, len: usize, fill: u8) -> NalUnit {
        NalUnit::new(nal_type, vec![fill; len])
    }

    fn mixed_sequence() -> Vec<NalUnit> {
        vec![
            unit(NalUnitType::Aud, 2, 0xA0),
            unit(NalUnitType::Sps, 4, 0xA1),
            unit(NalUnitType::Pps, 3, 0xA2),
            unit(NalUnitType::Sei, 5, 0xA3),
            unit(NalUnitType::SliceIdr, 6, 0xB0),
            unit(NalUnitType::FillerData, 2, 0xA4),
            unit(NalUnitType::Slice, 4, 0xB1),
        ]
    }

    #[test]
    fn test_extract_headers_exact_size() {
        let blob = extract_headers(&mixed_sequence());
        assert_eq!(blob.len(), 2 + 4 + 3 + 5 + 2);
        assert_eq!(&blob[..2], &[0xA0, 0xA0]);
        assert_eq!(&blob[2..6], &[0xA1; 4]);
        assert_eq!(*blob.last().unwrap(), 0xA4);
        assert!(!blob.contains(&0xB0));
    }

    #[test]
    fn test_extract_headers_into_overflow() {
        let mut small = [0u8; 5];
        let err = extract_headers_into(&mixed_sequence(), &mut small).unwrap_err();
        match err {
            EncappError::CapacityOverflow { needed, capacity } => {
                assert_eq!(needed, 16);
                assert_eq!(capacity, 5);
            }
            other => panic!("期望 CapacityOverflow, actual={other:?}"),
        }

        let mut big = [0u8; 64];
        assert_eq!(extract_headers_into(&mixed_sequence(), &mut big).unwrap(), 16);
    }

    #[test]
    fn test_prefixed_mode_layout() {
        let mut out = [0xFFu8; 32];
        let outcome = repackage_frame(&mixed_sequence(), &mut out, OutputMode::Prefixed);
        assert_eq!(outcome.bytes_written, 2 + 6 + 4);
        assert_eq!(outcome.slice_bytes, 10);
        assert_eq!(outcome.written_units, 2);
        assert!(!outcome.is_truncated());
        assert_eq!(&out[..2], &[0, 0]);
        assert_eq!(&out[2..8], &[0xB0; 6]);
        assert_eq!(&out[8..12], &[0xB1; 4]);
        // 超出写入长度的字节不被触碰
        assert_eq!(out[12], 0xFF);
    }

    #[test]
    fn test_annex_b_mode_layout() {
        let mut out = [0u8; 32];
        let outcome = repackage_frame(&mixed_sequence(), &mut out, OutputMode::AnnexB);
        assert_eq!(outcome.bytes_written, 10);
        assert_eq!(&out[..6], &[0xB0; 6]);
        assert_eq!(&out[6..10], &[0xB1; 4]);
    }

    #[test]
    fn test_prefix_written_without_slices() {
        let headers_only = vec![unit(NalUnitType::Sps, 4, 1), unit(NalUnitType::Pps, 2, 2)];
        let mut out = [0xEEu8; 8];
        let outcome = repackage_frame(&headers_only, &mut out, OutputMode::Prefixed);
        assert_eq!(outcome.bytes_written, 2);
        assert!(!outcome.has_payload());
        assert_eq!(&out[..2], &[0, 0]);

        let outcome = repackage_frame(&[], &mut out, OutputMode::AnnexB);
        assert_eq!(outcome.bytes_written, 0);
    }

    #[test]
    fn test_overflow_skips_unit_and_continues() {
        let nals = vec![
            unit(NalUnitType::Slice, 4, 0x01),
            unit(NalUnitType::Slice, 10, 0x02),
            unit(NalUnitType::Slice, 3, 0x03),
        ];
        let mut out = [0u8; 10];
        let outcome = repackage_frame(&nals, &mut out, OutputMode::Prefixed);
        assert!(outcome.is_truncated());
        assert_eq!(outcome.dropped_units, 1);
        assert_eq!(outcome.written_units, 2);
        assert_eq!(outcome.bytes_written, 2 + 4 + 3);
        assert_eq!(&out[2..6], &[0x01; 4]);
        assert_eq!(&out[6..9], &[0x03; 3]);
    }

    #[test]
    fn test_capacity_smaller_than_prefix() {
        let nals = vec![unit(NalUnitType::Slice, 10, 0x55)];
        let mut out = [0xAAu8; 1];
        let outcome = repackage_frame(&nals, &mut out, OutputMode::Prefixed);
        assert!(outcome.is_truncated());
        assert!(outcome.prefix_dropped);
        assert_eq!(outcome.dropped_units, 1);
        assert_eq!(outcome.bytes_written, 0);
        assert_eq!(out[0], 0xAA);
    }

    #[test]
    fn test_exact_fit() {
        let nals = vec![unit(NalUnitType::SliceIdr, 8, 0x65)];
        let mut out = [0u8; 10];
        let outcome = repackage_frame(&nals, &mut out, OutputMode::Prefixed);
        assert!(!outcome.is_truncated());
        assert_eq!(outcome.bytes_written, 10);
    }

    #[test]
    fn test_headers_and_slices_partition_input() {
        let nals = mixed_sequence();
        let headers = extract_headers(&nals);
        let mut out = [0u8; 64];
        let outcome = repackage_frame(&nals, &mut out, OutputMode::AnnexB);
        let total: usize = nals.iter().map(NalUnit::len).sum();
        assert_eq!(headers.len() + outcome.bytes_written, total);
        assert_eq!(slice_payload_len(&nals), outcome.slice_bytes);
    }

    #[test]
    fn test_output_mode_from_raw() {
        assert_eq!(OutputMode::from_raw(0), Some(OutputMode::Prefixed));
        assert_eq!(OutputMode::from_raw(1), Some(OutputMode::AnnexB));
        assert_eq!(OutputMode::from_raw(7), None);
    }
}
