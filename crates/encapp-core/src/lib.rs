//! # encapp-core
//!
//! encapp 原生桥接层核心库, 提供错误类型、颜色格式映射与有理数等基础设施.
//!
//! 其余 crate (codec/io/ffi) 都建立在这里定义的类型之上.

pub mod color_format;
pub mod error;
pub mod rational;

// 重导出常用类型
pub use color_format::{ColorFormat, PlaneLayout};
pub use error::{EncappError, EncappResult};
pub use rational::Rational;
