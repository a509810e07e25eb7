//! 统一错误类型定义.
//!
//! 所有 encapp crate 共用的错误类型. FFI 层通过 [`EncappError::code`]
//! 把错误折叠为 C 风格的负数状态码.

use thiserror::Error;

/// 状态码: 成功
pub const STATUS_OK: i32 = 0;
/// 状态码: 编码器未初始化
pub const STATUS_NOT_INITIALIZED: i32 = -1;
/// 状态码: 会话已打开
pub const STATUS_ALREADY_OPEN: i32 = -2;
/// 状态码: 编码器打开失败
pub const STATUS_OPEN_FAILED: i32 = -3;
/// 状态码: 输出缓冲区容量不足
pub const STATUS_BUFFER_TOO_SMALL: i32 = -4;
/// 状态码: 编码失败
pub const STATUS_ENCODE_FAILED: i32 = -5;
/// 状态码: 无效参数
pub const STATUS_INVALID_ARGUMENT: i32 = -6;
/// 状态码: 当前状态不允许该操作
pub const STATUS_INVALID_STATE: i32 = -7;
/// 状态码: I/O 错误
pub const STATUS_IO: i32 = -8;
/// 状态码: 空指针
pub const STATUS_NULL_POINTER: i32 = -9;
/// 状态码: 内部错误
pub const STATUS_INTERNAL: i32 = -10;

/// encapp 统一错误类型
#[derive(Debug, Error)]
pub enum EncappError {
    /// 没有已打开的编码器
    #[error("编码器未初始化")]
    NotInitialized,

    /// 已有会话处于打开状态, 不允许重复打开
    #[error("编码器已打开, 不允许重复打开")]
    AlreadyOpen,

    /// 编码器拒绝了配置
    #[error("编码器打开失败: {0}")]
    OpenFailed(String),

    /// 输出缓冲区容量不足
    #[error("缓冲区容量不足: 需要 {needed} 字节, 容量 {capacity} 字节")]
    CapacityOverflow { needed: usize, capacity: usize },

    /// 编码器返回负数状态, 原样携带
    #[error("编码失败: status={0}")]
    EncodeFailed(i32),

    /// 编码器拒绝重新配置
    #[error("重新配置失败: status={0}")]
    ReconfigureFailed(i32),

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 当前会话状态不允许该操作
    #[error("状态错误: {0}")]
    InvalidState(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl EncappError {
    /// 对应的 C 风格状态码 (恒为负数)
    pub fn code(&self) -> i32 {
        match self {
            Self::NotInitialized => STATUS_NOT_INITIALIZED,
            Self::AlreadyOpen => STATUS_ALREADY_OPEN,
            Self::OpenFailed(_) => STATUS_OPEN_FAILED,
            Self::CapacityOverflow { .. } => STATUS_BUFFER_TOO_SMALL,
            Self::EncodeFailed(_) | Self::ReconfigureFailed(_) => STATUS_ENCODE_FAILED,
            Self::InvalidArgument(_) => STATUS_INVALID_ARGUMENT,
            Self::InvalidState(_) => STATUS_INVALID_STATE,
            Self::Io(_) => STATUS_IO,
        }
    }
}

/// encapp 统一 Result 类型
pub type EncappResult<T> = Result<T, EncappError>;
