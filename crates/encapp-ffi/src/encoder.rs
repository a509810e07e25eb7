//! 编码器 FFI 导出.
//!
//! 句柄背后是一个 [`SessionSlot`], 同一句柄同一时刻至多一个打开的会话.
//! 没有链接原生编码器时使用参考编码器.

use std::ffi::CStr;
use std::os::raw::c_char;

use encapp_codec::reference::ReferenceEncoder;
use encapp_codec::{EncodeReport, EncoderParam, FrameDescriptor, OutputMode, SessionSlot};
use encapp_core::EncappError;
use log::error;

use crate::{
    ENCAPP_ERR_BUFFER_TOO_SMALL, ENCAPP_ERR_INVALID_ARGUMENT, ENCAPP_ERR_NULL_POINTER, ENCAPP_OK,
    byte_count, guard, guard_handle, slice_in, slice_out,
};

/// 编码参数键值对 (C 字符串, UTF-8)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EncappParam {
    /// 参数名
    pub key: *const c_char,
    /// 参数值
    pub value: *const c_char,
}

/// 帧描述信息
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct EncappFrameInfo {
    /// 显示时间戳, 编码时作为输入
    pub pts: i64,
    /// 解码时间戳
    pub dts: i64,
    /// 写入输出缓冲区的字节数
    pub size: i32,
    /// 是否为关键帧
    pub is_keyframe: bool,
}

impl EncappFrameInfo {
    fn to_descriptor(self) -> FrameDescriptor {
        FrameDescriptor {
            pts: self.pts,
            dts: self.dts,
            is_keyframe: self.is_keyframe,
            size: usize::try_from(self.size).unwrap_or(0),
        }
    }

    fn store(&mut self, descriptor: &FrameDescriptor) {
        self.pts = descriptor.pts;
        self.dts = descriptor.dts;
        self.is_keyframe = descriptor.is_keyframe;
        self.size = byte_count(descriptor.size);
    }
}

/// 编码器句柄 (不透明)
pub struct EncappEncoder {
    slot: SessionSlot,
    mode: OutputMode,
}

/// 错误折叠为状态码, 编码失败时记录编码器原始状态
fn status_of(err: &EncappError) -> i32 {
    match err {
        EncappError::EncodeFailed(raw) | EncappError::ReconfigureFailed(raw) => {
            error!("编码器返回错误状态: {raw}");
        }
        other => log::warn!("{other}"),
    }
    err.code()
}

/// 把 C 参数数组转换为参数列表
///
/// # Safety
///
/// `count > 0` 时 `params` 必须指向 `count` 个有效元素, 各字符串以 `\0` 结尾.
unsafe fn read_params(params: *const EncappParam, count: usize) -> Result<Vec<EncoderParam>, i32> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if params.is_null() {
        return Err(ENCAPP_ERR_NULL_POINTER);
    }
    // 安全: 由调用方保证
    let raw = unsafe { std::slice::from_raw_parts(params, count) };
    raw.iter()
        .map(|p| {
            if p.key.is_null() || p.value.is_null() {
                return Err(ENCAPP_ERR_NULL_POINTER);
            }
            // 安全: 由调用方保证以 \0 结尾
            let (key, value) = unsafe { (CStr::from_ptr(p.key), CStr::from_ptr(p.value)) };
            match (key.to_str(), value.to_str()) {
                (Ok(k), Ok(v)) => Ok(EncoderParam::new(k, v)),
                _ => Err(ENCAPP_ERR_INVALID_ARGUMENT),
            }
        })
        .collect()
}

/// 创建编码器句柄
///
/// `mode`: 0 = 带 2 字节前缀输出, 1 = Annex B 输出. 非法值返回空指针.
/// 句柄必须通过 [`encapp_encoder_free`] 释放.
#[unsafe(no_mangle)]
pub extern "C" fn encapp_encoder_new(mode: i32) -> *mut EncappEncoder {
    guard_handle(|| match OutputMode::from_raw(mode) {
        Some(mode) => Box::into_raw(Box::new(EncappEncoder {
            slot: SessionSlot::new(),
            mode,
        })),
        None => {
            log::warn!("非法输出模式: {mode}");
            std::ptr::null_mut()
        }
    })
}

/// 释放编码器句柄, 仍打开的会话一并关闭
///
/// # Safety
///
/// `encoder` 必须是 [`encapp_encoder_new`] 返回的指针或空指针, 且只能释放一次.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn encapp_encoder_free(encoder: *mut EncappEncoder) {
    if encoder.is_null() {
        return;
    }
    // 安全: 由调用方保证指针来自 Box::into_raw
    let mut handle = unsafe { Box::from_raw(encoder) };
    if handle.slot.is_open() {
        let _ = handle.slot.close();
    }
}

/// 打开编码会话
///
/// 已有打开的会话时返回 `ENCAPP_ERR_ALREADY_OPEN`, 已有会话不受影响.
///
/// # Safety
///
/// `encoder` 必须是有效句柄. `param_count > 0` 时 `params` 必须指向
/// `param_count` 个有效的 [`EncappParam`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn encapp_encoder_open(
    encoder: *mut EncappEncoder,
    params: *const EncappParam,
    param_count: usize,
    width: i32,
    height: i32,
    color_format: i32,
    bit_depth: i32,
) -> i32 {
    guard(|| {
        // 安全: 由调用方保证
        let Some(handle) = (unsafe { encoder.as_mut() }) else {
            return ENCAPP_ERR_NULL_POINTER;
        };
        let (Ok(width), Ok(height), Ok(bit_depth)) = (
            u32::try_from(width),
            u32::try_from(height),
            u32::try_from(bit_depth),
        ) else {
            return ENCAPP_ERR_INVALID_ARGUMENT;
        };
        // 安全: 由调用方保证
        let params = match unsafe { read_params(params, param_count) } {
            Ok(p) => p,
            Err(code) => return code,
        };
        let mode = handle.mode;
        match handle.slot.open(
            ReferenceEncoder::open_boxed,
            &params,
            width,
            height,
            color_format,
            bit_depth,
            mode,
        ) {
            Ok(()) => ENCAPP_OK,
            Err(e) => status_of(&e),
        }
    })
}

/// 把头部数据块写入 `out`, 返回写入字节数
///
/// 只能在第一次编码前调用一次. 容量不足返回 `ENCAPP_ERR_BUFFER_TOO_SMALL`.
///
/// # Safety
///
/// `encoder` 必须是有效句柄, `out` 必须指向至少 `capacity` 个可写字节.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn encapp_encoder_get_header(
    encoder: *mut EncappEncoder,
    out: *mut u8,
    capacity: usize,
) -> i32 {
    guard(|| {
        // 安全: 由调用方保证
        let (Some(handle), Some(out)) = (unsafe { encoder.as_mut() }, unsafe {
            slice_out(out, capacity)
        }) else {
            return ENCAPP_ERR_NULL_POINTER;
        };
        match handle.slot.get_header_into(out) {
            Ok(n) => byte_count(n),
            Err(e) => status_of(&e),
        }
    })
}

/// 编码一帧
///
/// 输入时 `info.pts` 为该帧的显示时间戳. 返回值:
/// - 正数: 产出一帧, 值为写入字节数 (含前缀)
/// - 0: 编码器缓存了输入, 暂无输出
/// - `ENCAPP_ERR_BUFFER_TOO_SMALL`: 输出被截断, `info.size` 仍为实际写入字节数
/// - 其他负数: 错误, `info` 保持不变
///
/// # Safety
///
/// `encoder` 必须是有效句柄, `input` 指向至少 `input_len` 个字节,
/// `out` 指向至少 `capacity` 个可写字节, `info` 指向有效的 [`EncappFrameInfo`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn encapp_encoder_encode(
    encoder: *mut EncappEncoder,
    input: *const u8,
    input_len: usize,
    out: *mut u8,
    capacity: usize,
    info: *mut EncappFrameInfo,
) -> i32 {
    guard(|| {
        // 安全: 由调用方保证
        let (Some(handle), Some(input), Some(out), Some(info)) = (
            unsafe { encoder.as_mut() },
            unsafe { slice_in(input, input_len) },
            unsafe { slice_out(out, capacity) },
            unsafe { info.as_mut() },
        ) else {
            return ENCAPP_ERR_NULL_POINTER;
        };
        let mut descriptor = info.to_descriptor();
        match handle.slot.encode(input, out, &mut descriptor) {
            Ok(report) => {
                info.store(&descriptor);
                report_status(&report)
            }
            Err(e) => status_of(&e),
        }
    })
}

/// 把编码报告映射为 C 返回值
///
/// 缓存与排空完成恒为 0, 只有产出的帧被截断时才报告容量不足.
fn report_status(report: &EncodeReport) -> i32 {
    if !report.is_produced() {
        0
    } else if report.repack.is_truncated() {
        ENCAPP_ERR_BUFFER_TOO_SMALL
    } else {
        byte_count(report.bytes_written())
    }
}

/// 刷新, 取出一帧缓存帧
///
/// 返回写入字节数, 0 表示已没有缓存帧 (排空完成). 其余约定同
/// [`encapp_encoder_encode`].
///
/// # Safety
///
/// `encoder` 必须是有效句柄, `out` 指向至少 `capacity` 个可写字节,
/// `info` 指向有效的 [`EncappFrameInfo`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn encapp_encoder_flush(
    encoder: *mut EncappEncoder,
    out: *mut u8,
    capacity: usize,
    info: *mut EncappFrameInfo,
) -> i32 {
    guard(|| {
        // 安全: 由调用方保证
        let (Some(handle), Some(out), Some(info)) = (
            unsafe { encoder.as_mut() },
            unsafe { slice_out(out, capacity) },
            unsafe { info.as_mut() },
        ) else {
            return ENCAPP_ERR_NULL_POINTER;
        };
        let mut descriptor = info.to_descriptor();
        match handle.slot.flush(out, &mut descriptor) {
            Ok(report) => {
                info.store(&descriptor);
                report_status(&report)
            }
            Err(e) => status_of(&e),
        }
    })
}

/// 编码器内部缓存的帧数, 未打开时返回 `ENCAPP_ERR_NOT_INITIALIZED`
///
/// # Safety
///
/// `encoder` 必须是有效句柄.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn encapp_encoder_delayed_frames(encoder: *const EncappEncoder) -> i32 {
    guard(|| {
        // 安全: 由调用方保证
        let Some(handle) = (unsafe { encoder.as_ref() }) else {
            return ENCAPP_ERR_NULL_POINTER;
        };
        match handle.slot.delayed_frame_count() {
            Ok(n) => byte_count(n),
            Err(e) => status_of(&e),
        }
    })
}

/// 在当前配置之上应用新参数
///
/// # Safety
///
/// 同 [`encapp_encoder_open`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn encapp_encoder_update_settings(
    encoder: *mut EncappEncoder,
    params: *const EncappParam,
    param_count: usize,
) -> i32 {
    guard(|| {
        // 安全: 由调用方保证
        let Some(handle) = (unsafe { encoder.as_mut() }) else {
            return ENCAPP_ERR_NULL_POINTER;
        };
        // 安全: 由调用方保证
        let params = match unsafe { read_params(params, param_count) } {
            Ok(p) => p,
            Err(code) => return code,
        };
        match handle.slot.update_settings(&params) {
            Ok(()) => ENCAPP_OK,
            Err(e) => status_of(&e),
        }
    })
}

/// 关闭编码会话, 句柄仍可再次打开
///
/// # Safety
///
/// `encoder` 必须是有效句柄.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn encapp_encoder_close(encoder: *mut EncappEncoder) -> i32 {
    guard(|| {
        // 安全: 由调用方保证
        let Some(handle) = (unsafe { encoder.as_mut() }) else {
            return ENCAPP_ERR_NULL_POINTER;
        };
        match handle.slot.close() {
            Ok(()) => ENCAPP_OK,
            Err(e) => status_of(&e),
        }
    })
}
