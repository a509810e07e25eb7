//! 编码会话.
//!
//! 会话独占一个编码器后端, 负责:
//! - 解析参数并打开后端
//! - 在编码前交付一次头部数据块
//! - 每次编码/刷新后重打包切片并更新帧描述
//! - 维护状态机 `Idle → Encoding → Draining → Drained`, 关闭即消费会话
//!
//! 排空一旦开始, 不能再送入新图像.

use bytes::Bytes;
use encapp_core::{ColorFormat, EncappError, EncappResult};
use log::{debug, error, warn};

use crate::backend::{BackendFactory, EncodeResult, EncoderBackend};
use crate::frame_info::{EncodeStatus, FrameDescriptor};
use crate::params::{EncoderConfig, EncoderParam};
use crate::picture::Picture;
use crate::repackager::{self, OutputMode, RepackOutcome};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// 已打开, 尚未送入图像
    Idle,
    /// 正在送入图像
    Encoding,
    /// 正在排空缓存帧
    Draining,
    /// 缓存帧已全部排空, 可以关闭
    Drained,
}

/// 单次编码/刷新的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeReport {
    /// 编码器状态分类
    pub status: EncodeStatus,
    /// 重打包结果
    pub repack: RepackOutcome,
}

impl EncodeReport {
    /// 是否产出了一帧
    pub fn is_produced(&self) -> bool {
        self.status == EncodeStatus::Produced
    }

    /// 编码器是否缓存了输入
    pub fn is_buffered(&self) -> bool {
        self.status == EncodeStatus::Buffered
    }

    /// 排空是否完成
    pub fn is_drained(&self) -> bool {
        self.status == EncodeStatus::Drained
    }

    /// 写入输出缓冲区的字节数 (含前缀)
    pub fn bytes_written(&self) -> usize {
        self.repack.bytes_written
    }
}

/// 编码会话
pub struct EncodeSession {
    backend: Box<dyn EncoderBackend>,
    config: EncoderConfig,
    mode: OutputMode,
    state: SessionState,
    headers_taken: bool,
}

impl std::fmt::Debug for EncodeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodeSession")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish()
    }
}

impl EncodeSession {
    /// 打开会话
    ///
    /// `color_format` 为调用方的像素格式编号, 见 [`ColorFormat::from_pix_fmt`].
    pub fn open(
        factory: BackendFactory,
        params: &[EncoderParam],
        width: u32,
        height: u32,
        color_format: i32,
        bit_depth: u32,
        mode: OutputMode,
    ) -> EncappResult<Self> {
        let color = ColorFormat::from_pix_fmt(color_format);
        let config = EncoderConfig::from_params(params, width, height, color, bit_depth);
        let backend = factory(&config).map_err(|e| match e {
            EncappError::OpenFailed(_) => e,
            other => EncappError::OpenFailed(other.to_string()),
        })?;
        debug!(
            "编码会话已打开: backend={}, {}x{} {} {}bit, mode={:?}",
            backend.name(),
            width,
            height,
            color,
            bit_depth,
            mode
        );
        Ok(Self {
            backend,
            config,
            mode,
            state: SessionState::Idle,
            headers_taken: false,
        })
    }

    /// 取出头部数据块 (恰好等长)
    pub fn get_header(&mut self) -> EncappResult<Bytes> {
        self.check_header_allowed()?;
        let nals = self.backend.headers()?;
        let blob = repackager::extract_headers(&nals);
        self.headers_taken = true;
        debug!("交付头部数据块: {} 字节", blob.len());
        Ok(blob)
    }

    /// 把头部数据块写入调用方缓冲区, 返回写入字节数
    ///
    /// 容量不足时返回 `CapacityOverflow`, 之后仍可用更大的缓冲区重试.
    pub fn get_header_into(&mut self, out: &mut [u8]) -> EncappResult<usize> {
        self.check_header_allowed()?;
        let nals = self.backend.headers()?;
        let written = repackager::extract_headers_into(&nals, out)?;
        self.headers_taken = true;
        debug!("交付头部数据块: {written} 字节");
        Ok(written)
    }

    /// 编码一帧
    ///
    /// `info.pts` 作为输入图像的显示时间戳.
    pub fn encode(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        info: &mut FrameDescriptor,
    ) -> EncappResult<EncodeReport> {
        if matches!(self.state, SessionState::Draining | SessionState::Drained) {
            return Err(EncappError::InvalidState(
                "排空开始后不能再送入图像".into(),
            ));
        }
        let picture = Picture::from_contiguous(
            input,
            self.config.width,
            self.config.height,
            self.config.color_format,
            self.config.bit_depth,
            info.pts,
        )?;
        let result = self.backend.encode(Some(&picture));
        let report = self.advance(result, output, info, false)?;
        self.state = SessionState::Encoding;
        Ok(report)
    }

    /// 刷新, 取出一帧缓存帧
    ///
    /// 返回 `Drained` 表示已没有缓存帧.
    pub fn flush(
        &mut self,
        output: &mut [u8],
        info: &mut FrameDescriptor,
    ) -> EncappResult<EncodeReport> {
        let result = self.backend.encode(None);
        let report = self.advance(result, output, info, true)?;
        self.state = if report.is_drained() {
            SessionState::Drained
        } else {
            SessionState::Draining
        };
        Ok(report)
    }

    /// 编码器内部缓存的帧数
    pub fn delayed_frame_count(&self) -> usize {
        self.backend.delayed_frames()
    }

    /// 在当前配置之上应用新参数并重新配置编码器
    ///
    /// 失败时会话配置保持不变.
    pub fn update_settings(&mut self, params: &[EncoderParam]) -> EncappResult<()> {
        let mut config = self.config.clone();
        config.apply(params);
        let status = self.backend.reconfigure(&config);
        if status < 0 {
            error!("重新配置失败: status={status}");
            return Err(EncappError::ReconfigureFailed(status));
        }
        self.config = config;
        Ok(())
    }

    /// 编码器当前生效的参数
    pub fn all_settings(&self) -> Vec<(String, String)> {
        self.backend.parameters()
    }

    /// 当前状态
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 当前配置
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// 输出模式
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// 一帧原始输入的字节数
    pub fn input_frame_size(&self) -> EncappResult<usize> {
        self.config.color_format.frame_size(
            self.config.width,
            self.config.height,
            self.config.bit_depth,
        )
    }

    /// 关闭会话, 释放编码器
    pub fn close(self) {
        let pending = self.backend.delayed_frames();
        if pending > 0 {
            warn!("关闭编码会话时仍有 {pending} 帧未排空, 直接丢弃");
        }
        debug!("编码会话已关闭: backend={}", self.backend.name());
    }

    fn check_header_allowed(&self) -> EncappResult<()> {
        if self.headers_taken {
            return Err(EncappError::InvalidState("头部数据块已交付".into()));
        }
        if self.state != SessionState::Idle {
            return Err(EncappError::InvalidState(
                "头部数据块只能在编码开始前获取".into(),
            ));
        }
        Ok(())
    }

    /// 按编码器状态更新帧描述, 出错时帧描述保持原样
    fn advance(
        &self,
        result: EncodeResult,
        output: &mut [u8],
        info: &mut FrameDescriptor,
        flushing: bool,
    ) -> EncappResult<EncodeReport> {
        let Some(status) = EncodeStatus::from_raw(result.status, flushing) else {
            error!("编码失败: status={}", result.status);
            return Err(EncappError::EncodeFailed(result.status));
        };

        let repack = repackager::repackage_frame(&result.nals, output, self.mode);
        match status {
            EncodeStatus::Produced => info.record_produced(&result.picture, repack.bytes_written),
            EncodeStatus::Buffered | EncodeStatus::Drained => {
                info.record_buffered(&result.picture)
            }
        }
        Ok(EncodeReport { status, repack })
    }
}
