//! 输入颜色格式.
//!
//! 调用方以 MediaCodec 风格的整数编号描述原始帧格式, 这里把编号映射到
//! 编码器可以理解的颜色格式, 并给出从连续缓冲区切分平面的布局.

use std::fmt;

use crate::error::{EncappError, EncappResult};

/// 编码器输入颜色格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorFormat {
    /// I420: Y + U + V 三平面, 4:2:0
    #[default]
    I420,
    /// NV12: Y 平面 + UV 交错
    Nv12,
    /// NV21: Y 平面 + VU 交错
    Nv21,
    /// BGRA 打包格式
    Bgra,
}

/// 单个平面在连续缓冲区中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    /// 相对缓冲区起始的偏移 (字节)
    pub offset: usize,
    /// 平面长度 (字节)
    pub len: usize,
    /// 行跨度 (字节)
    pub stride: usize,
}

impl ColorFormat {
    /// 从调用方的像素格式编号映射
    ///
    /// 未知编号回退到 I420. 编号 54 (p010le) 同样映射为 I420,
    /// 位深由 `bit_depth` 单独描述.
    pub fn from_pix_fmt(pix_fmt: i32) -> Self {
        match pix_fmt {
            0 | 1 | 54 => Self::I420,
            2 => Self::Nv12,
            3 => Self::Nv21,
            // 编码器没有更接近的格式
            4 => Self::Bgra,
            other => {
                log::warn!("未知像素格式编号 {other}, 按 I420 处理");
                Self::I420
            }
        }
    }

    /// 平面数量
    pub const fn plane_count(&self) -> usize {
        match self {
            Self::I420 => 3,
            Self::Nv12 | Self::Nv21 => 2,
            Self::Bgra => 1,
        }
    }

    /// 计算各平面的布局
    ///
    /// `bit_depth` 大于 8 时每个采样占 2 字节.
    pub fn plane_layout(
        &self,
        width: u32,
        height: u32,
        bit_depth: u32,
    ) -> EncappResult<Vec<PlaneLayout>> {
        if width == 0 || height == 0 {
            return Err(EncappError::InvalidArgument(format!(
                "分辨率非法: {width}x{height}"
            )));
        }
        let bytes_per_sample = match bit_depth {
            8 => 1usize,
            9..=16 => 2,
            _ => {
                return Err(EncappError::InvalidArgument(format!(
                    "不支持的位深: {bit_depth}"
                )));
            }
        };

        let w = width as usize;
        let h = height as usize;
        let too_large =
            || EncappError::InvalidArgument(format!("分辨率过大: {width}x{height}"));
        let mul = |a: usize, b: usize| a.checked_mul(b).ok_or_else(too_large);
        let luma_stride = mul(w, bytes_per_sample)?;
        let luma = mul(luma_stride, h)?;

        let planes = match self {
            Self::I420 => {
                let chroma_stride = mul(w.div_ceil(2), bytes_per_sample)?;
                let chroma = mul(chroma_stride, h.div_ceil(2))?;
                let v_offset = luma.checked_add(chroma).ok_or_else(too_large)?;
                v_offset.checked_add(chroma).ok_or_else(too_large)?;
                vec![
                    PlaneLayout {
                        offset: 0,
                        len: luma,
                        stride: luma_stride,
                    },
                    PlaneLayout {
                        offset: luma,
                        len: chroma,
                        stride: chroma_stride,
                    },
                    PlaneLayout {
                        offset: v_offset,
                        len: chroma,
                        stride: chroma_stride,
                    },
                ]
            }
            Self::Nv12 | Self::Nv21 => {
                let chroma_stride = mul(mul(w.div_ceil(2), 2)?, bytes_per_sample)?;
                let chroma = mul(chroma_stride, h.div_ceil(2))?;
                luma.checked_add(chroma).ok_or_else(too_large)?;
                vec![
                    PlaneLayout {
                        offset: 0,
                        len: luma,
                        stride: luma_stride,
                    },
                    PlaneLayout {
                        offset: luma,
                        len: chroma,
                        stride: chroma_stride,
                    },
                ]
            }
            Self::Bgra => {
                let stride = mul(w, 4)?;
                vec![PlaneLayout {
                    offset: 0,
                    len: mul(stride, h)?,
                    stride,
                }]
            }
        };
        Ok(planes)
    }

    /// 一帧所需的总字节数
    pub fn frame_size(&self, width: u32, height: u32, bit_depth: u32) -> EncappResult<usize> {
        let planes = self.plane_layout(width, height, bit_depth)?;
        Ok(planes.iter().map(|p| p.len).sum())
    }
}

impl fmt::Display for ColorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I420 => "i420",
            Self::Nv12 => "nv12",
            Self::Nv21 => "nv21",
            Self::Bgra => "bgra",
        };
        f.write_str(name)
    }
}
