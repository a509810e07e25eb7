//! 帧描述信息与编码状态解释.
//!
//! 每次编码/刷新调用后, 会话根据编码器返回状态的符号更新帧描述:
//! - 正数: 产出一帧 (Produced)
//! - 零: 编码器缓存了输入, 暂无输出 (Buffered)
//! - 负数: 编码失败, 帧描述保持原样

use crate::backend::OutputPicture;

/// 一次编码操作的帧元数据
///
/// 调用方持有, 在调用期间由会话更新.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameDescriptor {
    /// 显示时间戳 (调用方给出, 不透明的排序键)
    pub pts: i64,
    /// 解码时间戳 (编码器给出)
    pub dts: i64,
    /// 是否为关键帧
    pub is_keyframe: bool,
    /// 本次写入输出缓冲区的字节数
    pub size: usize,
}

impl FrameDescriptor {
    /// 以调用方的显示时间戳创建
    pub fn new(pts: i64) -> Self {
        Self {
            pts,
            ..Self::default()
        }
    }

    /// 产出一帧后更新
    pub(crate) fn record_produced(&mut self, picture: &OutputPicture, size: usize) {
        self.size = size;
        self.apply_picture(picture);
    }

    /// 编码器缓存输入后更新: 大小清零, 时间戳仍取自 (可能为空的) 输出图像
    pub(crate) fn record_buffered(&mut self, picture: &OutputPicture) {
        self.size = 0;
        self.apply_picture(picture);
    }

    fn apply_picture(&mut self, picture: &OutputPicture) {
        self.pts = picture.pts;
        self.dts = picture.dts;
        self.is_keyframe = picture.is_keyframe;
    }
}

/// 编码器单次调用的结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStatus {
    /// 产出了一帧
    Produced,
    /// 编码器接收了输入但暂无输出 (重排序/前瞻延迟)
    Buffered,
    /// 刷新时已没有缓存帧, 排空完成
    Drained,
}

impl EncodeStatus {
    /// 按编码器返回值的符号分类
    ///
    /// 负数返回 `None`, 由调用方作为编码失败处理.
    /// `flushing` 为真时零值表示排空完成.
    pub fn from_raw(status: i32, flushing: bool) -> Option<Self> {
        match status {
            s if s > 0 => Some(Self::Produced),
            0 if flushing => Some(Self::Drained),
            0 => Some(Self::Buffered),
            _ => None,
        }
    }
}
