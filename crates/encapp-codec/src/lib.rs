//! # encapp-codec
//!
//! 编码会话与码流重打包库.
//!
//! 核心是 NAL 单元的分类与重打包: 编码器每次调用产出一组 NAL 单元,
//! 头部类 (SPS/PPS/SEI/AUD/填充) 只在会话开始时以头部数据块的形式交付一次,
//! 切片类按帧拼接进调用方提供的定长输出缓冲区.
//!
//! ## 使用示例
//!
//! ```rust
//! use encapp_codec::{EncodeSession, EncoderParam, FrameDescriptor, OutputMode};
//! use encapp_codec::reference::ReferenceEncoder;
//!
//! let params = vec![EncoderParam::new("bframes", "0")];
//! let mut session = EncodeSession::open(
//!     ReferenceEncoder::open_boxed,
//!     &params,
//!     16,
//!     16,
//!     0,
//!     8,
//!     OutputMode::Prefixed,
//! )
//! .unwrap();
//!
//! let header = session.get_header().unwrap();
//! assert!(!header.is_empty());
//!
//! let input = vec![0u8; 16 * 16 * 3 / 2];
//! let mut output = vec![0u8; 4096];
//! let mut info = FrameDescriptor::new(0);
//! let report = session.encode(&input, &mut output, &mut info).unwrap();
//! assert!(report.is_produced());
//! assert_eq!(&output[..2], &[0, 0]);
//! ```

pub mod backend;
pub mod frame_info;
pub mod nal;
pub mod params;
pub mod picture;
pub mod reference;
pub mod repackager;
pub mod session;
pub mod slot;

// 重导出常用类型
pub use backend::{BackendFactory, EncodeResult, EncoderBackend, OutputPicture};
pub use frame_info::{EncodeStatus, FrameDescriptor};
pub use nal::{NalClass, NalUnit, NalUnitType};
pub use params::{EncoderConfig, EncoderParam, RateControl};
pub use picture::Picture;
pub use repackager::{OutputMode, RepackOutcome};
pub use session::{EncodeReport, EncodeSession, SessionState};
pub use slot::SessionSlot;
