//! # encapp
//!
//! 视频编码测试工具的原生桥接层, 纯 Rust 实现.
//!
//! 核心是编码器输出的 NAL 单元重打包:
//! - **分类**: SPS/PPS/SEI/AUD/填充归为头部类, 其余归为切片类
//! - **头部交付**: 会话开始时把头部类单元拼成一个数据块, 只交付一次
//! - **逐帧输出**: 切片类按产出顺序写入定长输出缓冲区, 支持 2 字节前缀与 Annex B 两种模式
//! - **缓存排空**: 跟踪编码器前瞻延迟, 刷新直至排空
//!
//! # 快速开始
//!
//! ```rust
//! use encapp::codec::{EncodeSession, EncoderParam, FrameDescriptor, OutputMode};
//! use encapp::codec::reference::ReferenceEncoder;
//!
//! let params = vec![EncoderParam::new("bframes", "1")];
//! let mut session =
//!     EncodeSession::open(ReferenceEncoder::open_boxed, &params, 16, 16, 0, 8, OutputMode::AnnexB)
//!         .unwrap();
//!
//! let input = vec![0u8; 16 * 16 * 3 / 2];
//! let mut output = vec![0u8; 1024];
//! let mut info = FrameDescriptor::new(0);
//! assert!(session.encode(&input, &mut output, &mut info).unwrap().is_buffered());
//! assert!(session.flush(&mut output, &mut info).unwrap().is_produced());
//! assert!(session.flush(&mut output, &mut info).unwrap().is_drained());
//! session.close();
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `encapp-core` | 错误类型、颜色格式、有理数 |
//! | `encapp-codec` | NAL 分类与重打包、编码会话 |
//! | `encapp-io` | 原始帧文件读取 |
//! | `encapp-ffi` | C FFI 导出 |

/// 核心类型与工具
pub use encapp_core as core;

/// NAL 重打包与编码会话
pub use encapp_codec as codec;

/// 原始帧文件读取
pub use encapp_io as io;

pub mod logging;

/// 获取 encapp 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
