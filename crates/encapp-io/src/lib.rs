//! # encapp-io
//!
//! 原始帧文件读取.
//!
//! 测试工具把未压缩的原始帧首尾相接存成一个平面文件, 这里按调用方给出的
//! 大小逐块读取, 文件末尾的短读是正常结果而不是错误.

pub mod raw_reader;

pub use raw_reader::RawFileReader;
