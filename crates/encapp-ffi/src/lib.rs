//! # encapp-ffi
//!
//! encapp C FFI 导出层.
//!
//! 把编码会话与原始帧读取导出为 C 兼容的函数接口, 供 JNI/ObjC 桥接层调用.
//!
//! # 命名规范
//!
//! 所有导出函数以 `encapp_` 前缀命名, 例如:
//! - `encapp_version()` - 获取版本号
//! - `encapp_encoder_encode()` - 编码一帧
//!
//! # 返回值约定
//!
//! 所有操作通过 `i32` 返回状态: 0 或正数表示成功 (部分函数返回字节数),
//! 负数为错误码, 见 `ENCAPP_ERR_*` 与 [`encapp_error_string`].
//! panic 不会越过 FFI 边界, 统一折叠为 `ENCAPP_ERR_INTERNAL`.
//!
//! # 内存管理
//!
//! - 由 encapp 分配的句柄必须通过对应的 `encapp_*_free()` / `encapp_*_close()` 释放
//! - 调用方分配的缓冲区由调用方负责释放, encapp 不在调用返回后保留任何引用

use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use encapp_core::error;
use tracing_subscriber::EnvFilter;

pub mod encoder;
pub mod raw_reader;

pub use encoder::{EncappEncoder, EncappFrameInfo, EncappParam};
pub use raw_reader::EncappRawReader;

/// 成功
pub const ENCAPP_OK: i32 = error::STATUS_OK;
/// 编码器未初始化
pub const ENCAPP_ERR_NOT_INITIALIZED: i32 = error::STATUS_NOT_INITIALIZED;
/// 编码器已打开
pub const ENCAPP_ERR_ALREADY_OPEN: i32 = error::STATUS_ALREADY_OPEN;
/// 编码器打开失败
pub const ENCAPP_ERR_OPEN_FAILED: i32 = error::STATUS_OPEN_FAILED;
/// 输出缓冲区容量不足
pub const ENCAPP_ERR_BUFFER_TOO_SMALL: i32 = error::STATUS_BUFFER_TOO_SMALL;
/// 编码失败
pub const ENCAPP_ERR_ENCODE_FAILED: i32 = error::STATUS_ENCODE_FAILED;
/// 无效参数
pub const ENCAPP_ERR_INVALID_ARGUMENT: i32 = error::STATUS_INVALID_ARGUMENT;
/// 状态错误
pub const ENCAPP_ERR_INVALID_STATE: i32 = error::STATUS_INVALID_STATE;
/// I/O 错误
pub const ENCAPP_ERR_IO: i32 = error::STATUS_IO;
/// 空指针
pub const ENCAPP_ERR_NULL_POINTER: i32 = error::STATUS_NULL_POINTER;
/// 内部错误 (含 panic)
pub const ENCAPP_ERR_INTERNAL: i32 = error::STATUS_INTERNAL;

/// 日志过滤环境变量
const LOG_ENV: &str = "ENCAPP_LOG";

/// 获取 encapp 版本号字符串
///
/// 返回的字符串指针为静态分配, 无需释放.
#[unsafe(no_mangle)]
pub extern "C" fn encapp_version() -> *const c_char {
    c"0.1.0".as_ptr()
}

/// 初始化 encapp 库
///
/// 安装控制台日志输出, 过滤级别取自 `ENCAPP_LOG` 环境变量 (默认 info).
/// 可安全多次调用, 宿主已安装全局日志时不做任何事.
#[unsafe(no_mangle)]
pub extern "C" fn encapp_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        if tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
            .is_err()
        {
            log::debug!("全局日志已由宿主安装, 跳过");
        }
    });
}

/// 获取错误码对应的说明
///
/// 返回的字符串指针为静态分配, 无需释放.
#[unsafe(no_mangle)]
pub extern "C" fn encapp_error_string(code: i32) -> *const c_char {
    let msg = match code {
        ENCAPP_OK => c"成功",
        ENCAPP_ERR_NOT_INITIALIZED => c"编码器未初始化",
        ENCAPP_ERR_ALREADY_OPEN => c"编码器已打开",
        ENCAPP_ERR_OPEN_FAILED => c"编码器打开失败",
        ENCAPP_ERR_BUFFER_TOO_SMALL => c"缓冲区容量不足",
        ENCAPP_ERR_ENCODE_FAILED => c"编码失败",
        ENCAPP_ERR_INVALID_ARGUMENT => c"无效参数",
        ENCAPP_ERR_INVALID_STATE => c"状态错误",
        ENCAPP_ERR_IO => c"I/O 错误",
        ENCAPP_ERR_NULL_POINTER => c"空指针",
        ENCAPP_ERR_INTERNAL => c"内部错误",
        _ => c"未知错误",
    };
    msg.as_ptr()
}

/// 在 FFI 边界捕获 panic, 折叠为内部错误码
pub(crate) fn guard(f: impl FnOnce() -> i32) -> i32 {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        log::error!("FFI 调用发生 panic");
        ENCAPP_ERR_INTERNAL
    })
}

/// 捕获返回句柄的导出函数中的 panic, panic 时返回空指针
pub(crate) fn guard_handle<T>(f: impl FnOnce() -> *mut T) -> *mut T {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        log::error!("FFI 调用发生 panic");
        std::ptr::null_mut()
    })
}

/// 字节数转状态返回值
pub(crate) fn byte_count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// 从调用方指针构造只读切片, 空指针返回 `None`
///
/// # Safety
///
/// 非空时 `ptr` 必须指向至少 `len` 个有效字节.
pub(crate) unsafe fn slice_in<'a>(ptr: *const u8, len: usize) -> Option<&'a [u8]> {
    if ptr.is_null() {
        return None;
    }
    // 安全: 由调用方保证
    Some(unsafe { std::slice::from_raw_parts(ptr, len) })
}

/// 从调用方指针构造可写切片, 空指针返回 `None`
///
/// # Safety
///
/// 非空时 `ptr` 必须指向至少 `len` 个可写字节, 且调用期间无其他引用.
pub(crate) unsafe fn slice_out<'a>(ptr: *mut u8, len: usize) -> Option<&'a mut [u8]> {
    if ptr.is_null() {
        return None;
    }
    // 安全: 由调用方保证
    Some(unsafe { std::slice::from_raw_parts_mut(ptr, len) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_version() {
        let v = unsafe { CStr::from_ptr(encapp_version()) };
        assert_eq!(v.to_str().unwrap(), "0.1.0");
    }

    #[test]
    fn test_error_strings() {
        let ok = unsafe { CStr::from_ptr(encapp_error_string(ENCAPP_OK)) };
        assert_eq!(ok.to_str().unwrap(), "成功");
        let unknown = unsafe { CStr::from_ptr(encapp_error_string(-999)) };
        assert_eq!(unknown.to_str().unwrap(), "未知错误");
        for code in ENCAPP_ERR_INTERNAL..=ENCAPP_ERR_NOT_INITIALIZED {
            let msg = unsafe { CStr::from_ptr(encapp_error_string(code)) };
            assert_ne!(msg.to_str().unwrap(), "未知错误", "code={code}");
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        encapp_init();
        encapp_init();
    }

    #[test]
    fn test_guard_catches_panic() {
        assert_eq!(guard(|| 5), 5);
        assert_eq!(guard(|| panic!("boom")), ENCAPP_ERR_INTERNAL);
    }

    #[test]
    fn test_guard_handle_returns_null_on_panic() {
        let handle: *mut u8 = guard_handle(|| panic!("boom"));
        assert!(handle.is_null());

        let raw = guard_handle(|| Box::into_raw(Box::new(7u8)));
        assert!(!raw.is_null());
        // 安全: 指针来自上面的 Box::into_raw
        assert_eq!(*unsafe { Box::from_raw(raw) }, 7);
    }
}
