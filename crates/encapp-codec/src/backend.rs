//! 编码器能力 trait 定义.
//!
//! 会话只依赖这里的调用约定, 不关心背后是哪一个具体编码器.

use encapp_core::EncappResult;

use crate::nal::NalUnit;
use crate::params::EncoderConfig;
use crate::picture::Picture;

/// 编码器给出的输出图像信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputPicture {
    /// 显示时间戳
    pub pts: i64,
    /// 解码时间戳
    pub dts: i64,
    /// 是否为关键帧
    pub is_keyframe: bool,
}

/// 编码器单次调用的结果
#[derive(Debug, Clone, Default)]
pub struct EncodeResult {
    /// 按产出顺序排列的 NAL 单元, 编码器缓存输入时为空
    pub nals: Vec<NalUnit>,
    /// 输出图像信息
    pub picture: OutputPicture,
    /// 状态: 正数为产出的总字节数, 0 为已缓存, 负数为错误
    pub status: i32,
}

impl EncodeResult {
    /// 以负数状态构造错误结果
    pub fn failed(status: i32) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }
}

/// 编码器能力
///
/// 调用流程:
/// 1. 由 [`BackendFactory`] 按配置打开
/// 2. `headers()` 取出码流头部
/// 3. 反复 `encode(Some(picture))` 送入图像
/// 4. 反复 `encode(None)` 排空缓存, 直到状态为 0
/// 5. drop 即关闭
pub trait EncoderBackend: Send {
    /// 编码器名称
    fn name(&self) -> &str;

    /// 获取码流头部 NAL 单元
    fn headers(&mut self) -> EncappResult<Vec<NalUnit>>;

    /// 编码一帧, `None` 表示刷新
    fn encode(&mut self, picture: Option<&Picture>) -> EncodeResult;

    /// 按新配置重新配置, 返回编码器原始状态 (负数为失败)
    fn reconfigure(&mut self, config: &EncoderConfig) -> i32;

    /// 编码器内部缓存的帧数
    fn delayed_frames(&self) -> usize;

    /// 当前生效的参数, 以键值对列出
    fn parameters(&self) -> Vec<(String, String)>;
}

/// 按配置打开编码器的工厂函数
pub type BackendFactory = fn(&EncoderConfig) -> EncappResult<Box<dyn EncoderBackend>>;
