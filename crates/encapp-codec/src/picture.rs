//! 编码器输入图像.

use encapp_core::{ColorFormat, EncappError, EncappResult};

/// 送入编码器的一帧原始图像
///
/// 平面数据从调用方的连续缓冲区拷贝而来, 不引用调用方内存.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    /// 各平面的像素数据
    pub data: Vec<Vec<u8>>,
    /// 各平面每行的字节数
    pub linesize: Vec<usize>,
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 颜色格式
    pub color_format: ColorFormat,
    /// 位深
    pub bit_depth: u32,
    /// 显示时间戳
    pub pts: i64,
}

impl Picture {
    /// 按颜色格式的平面布局切分连续缓冲区
    ///
    /// 缓冲区短于一帧时返回 `InvalidArgument`, 多出的尾部字节被忽略.
    pub fn from_contiguous(
        buf: &[u8],
        width: u32,
        height: u32,
        color_format: ColorFormat,
        bit_depth: u32,
        pts: i64,
    ) -> EncappResult<Self> {
        let planes = color_format.plane_layout(width, height, bit_depth)?;
        let needed: usize = planes.iter().map(|p| p.len).sum();
        if buf.len() < needed {
            return Err(EncappError::InvalidArgument(format!(
                "输入缓冲区不足一帧: {} < {needed} ({color_format} {width}x{height})",
                buf.len()
            )));
        }

        Ok(Self {
            data: planes
                .iter()
                .map(|p| buf[p.offset..p.offset + p.len].to_vec())
                .collect(),
            linesize: planes.iter().map(|p| p.stride).collect(),
            width,
            height,
            color_format,
            bit_depth,
            pts,
        })
    }

    /// 第一个平面 (亮度或打包像素)
    pub fn luma(&self) -> &[u8] {
        self.data.first().map(Vec::as_slice).unwrap_or_default()
    }
}
