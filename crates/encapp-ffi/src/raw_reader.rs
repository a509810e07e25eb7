//! 原始帧文件读取 FFI 导出.

use std::ffi::CStr;
use std::os::raw::c_char;

use encapp_io::RawFileReader;

use crate::{
    ENCAPP_ERR_INVALID_ARGUMENT, ENCAPP_ERR_NULL_POINTER, byte_count, guard, guard_handle,
    slice_out,
};

/// 原始帧读取器句柄 (不透明)
pub struct EncappRawReader {
    inner: RawFileReader,
}

/// 打开原始帧文件, 失败返回空指针
///
/// 句柄必须通过 [`encapp_raw_reader_close`] 释放.
///
/// # Safety
///
/// `path` 必须是以 `\0` 结尾的 UTF-8 字符串或空指针.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn encapp_raw_reader_open(path: *const c_char) -> *mut EncappRawReader {
    guard_handle(|| {
        if path.is_null() {
            return std::ptr::null_mut();
        }
        // 安全: 由调用方保证以 \0 结尾
        let Ok(path) = (unsafe { CStr::from_ptr(path) }).to_str() else {
            log::warn!("文件路径不是合法 UTF-8");
            return std::ptr::null_mut();
        };
        match RawFileReader::open(path) {
            Ok(inner) => Box::into_raw(Box::new(EncappRawReader { inner })),
            Err(e) => {
                log::error!("打开原始帧文件失败: {path}, {e}");
                std::ptr::null_mut()
            }
        }
    })
}

/// 读取至多 `size` 字节到 `buf`, 返回实际读取的字节数
///
/// 文件末尾的短读不是错误, 返回 0 表示已到末尾.
///
/// # Safety
///
/// `reader` 必须是有效句柄, `buf` 必须指向至少 `size` 个可写字节.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn encapp_raw_reader_fill(
    reader: *mut EncappRawReader,
    buf: *mut u8,
    size: usize,
) -> i32 {
    guard(|| {
        if size > i32::MAX as usize {
            return ENCAPP_ERR_INVALID_ARGUMENT;
        }
        // 安全: 由调用方保证
        let (Some(handle), Some(buf)) = (unsafe { reader.as_mut() }, unsafe {
            slice_out(buf, size)
        }) else {
            return ENCAPP_ERR_NULL_POINTER;
        };
        match handle.inner.fill(buf, size) {
            Ok(n) => byte_count(n),
            Err(e) => {
                log::error!("读取原始帧失败: {e}");
                e.code()
            }
        }
    })
}

/// 关闭读取器并释放句柄
///
/// # Safety
///
/// `reader` 必须是 [`encapp_raw_reader_open`] 返回的指针或空指针, 且只能关闭一次.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn encapp_raw_reader_close(reader: *mut EncappRawReader) {
    if reader.is_null() {
        return;
    }
    // 安全: 由调用方保证指针来自 Box::into_raw
    let handle = unsafe { Box::from_raw(reader) };
    handle.inner.close();
}
