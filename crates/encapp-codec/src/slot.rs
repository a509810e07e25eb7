//! 单会话槽位.
//!
//! 外部调用方 (C/JNI) 只能持有一个不透明句柄, 槽位在句柄背后保证同一时刻
//! 至多一个打开的会话: 重复打开被拒绝且不影响已有会话, 空槽位上的其余操作
//! 一律返回 `NotInitialized`.

use bytes::Bytes;
use encapp_core::{EncappError, EncappResult};
use log::warn;

use crate::backend::BackendFactory;
use crate::frame_info::FrameDescriptor;
use crate::params::EncoderParam;
use crate::repackager::OutputMode;
use crate::session::{EncodeReport, EncodeSession, SessionState};

/// 至多容纳一个编码会话的槽位
#[derive(Debug, Default)]
pub struct SessionSlot {
    session: Option<EncodeSession>,
}

impl SessionSlot {
    /// 创建空槽位
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否已有打开的会话
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// 打开会话, 槽位已占用时返回 `AlreadyOpen`
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &mut self,
        factory: BackendFactory,
        params: &[EncoderParam],
        width: u32,
        height: u32,
        color_format: i32,
        bit_depth: u32,
        mode: OutputMode,
    ) -> EncappResult<()> {
        if self.session.is_some() {
            warn!("编码器已打开, 拒绝重复打开");
            return Err(EncappError::AlreadyOpen);
        }
        let session =
            EncodeSession::open(factory, params, width, height, color_format, bit_depth, mode)?;
        self.session = Some(session);
        Ok(())
    }

    /// 借用已打开的会话
    pub fn session(&self) -> EncappResult<&EncodeSession> {
        self.session.as_ref().ok_or(EncappError::NotInitialized)
    }

    /// 可变借用已打开的会话
    pub fn session_mut(&mut self) -> EncappResult<&mut EncodeSession> {
        self.session.as_mut().ok_or(EncappError::NotInitialized)
    }

    /// 见 [`EncodeSession::get_header`]
    pub fn get_header(&mut self) -> EncappResult<Bytes> {
        self.session_mut()?.get_header()
    }

    /// 见 [`EncodeSession::get_header_into`]
    pub fn get_header_into(&mut self, out: &mut [u8]) -> EncappResult<usize> {
        self.session_mut()?.get_header_into(out)
    }

    /// 见 [`EncodeSession::encode`]
    pub fn encode(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        info: &mut FrameDescriptor,
    ) -> EncappResult<EncodeReport> {
        self.session_mut()?.encode(input, output, info)
    }

    /// 见 [`EncodeSession::flush`]
    pub fn flush(
        &mut self,
        output: &mut [u8],
        info: &mut FrameDescriptor,
    ) -> EncappResult<EncodeReport> {
        self.session_mut()?.flush(output, info)
    }

    /// 见 [`EncodeSession::delayed_frame_count`]
    pub fn delayed_frame_count(&self) -> EncappResult<usize> {
        Ok(self.session()?.delayed_frame_count())
    }

    /// 见 [`EncodeSession::update_settings`]
    pub fn update_settings(&mut self, params: &[EncoderParam]) -> EncappResult<()> {
        self.session_mut()?.update_settings(params)
    }

    /// 见 [`EncodeSession::all_settings`]
    pub fn all_settings(&self) -> EncappResult<Vec<(String, String)>> {
        Ok(self.session()?.all_settings())
    }

    /// 当前会话状态
    pub fn state(&self) -> EncappResult<SessionState> {
        Ok(self.session()?.state())
    }

    /// 关闭并清空槽位, 空槽位返回 `NotInitialized`
    pub fn close(&mut self) -> EncappResult<()> {
        let session = self.session.take().ok_or(EncappError::NotInitialized)?;
        session.close();
        Ok(())
    }
}
