//! 原始帧文件读取器.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use encapp_core::{EncappError, EncappResult};
use log::debug;

/// 读缓冲区大小 (256 KB), 一帧 1080p I420 约 3 MB, 按块读取
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// 原始帧文件读取器
pub struct RawFileReader {
    inner: Box<dyn Read + Send>,
    path: Option<PathBuf>,
    /// 累计读取的字节数
    total_read: u64,
}

impl std::fmt::Debug for RawFileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFileReader")
            .field("path", &self.path)
            .field("total_read", &self.total_read)
            .finish()
    }
}

impl RawFileReader {
    /// 打开文件 (只读)
    pub fn open(path: impl AsRef<Path>) -> EncappResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        debug!("打开原始帧文件: {}", path.display());
        Ok(Self {
            inner: Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, file)),
            path: Some(path.to_path_buf()),
            total_read: 0,
        })
    }

    /// 从任意数据源创建
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            inner: Box::new(reader),
            path: None,
            total_read: 0,
        }
    }

    /// 文件路径 (从数据源创建时为 `None`)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 累计读取的字节数
    pub fn total_read(&self) -> u64 {
        self.total_read
    }

    /// 读取至多 `size` 字节到 `buf` 开头, 返回实际读取的字节数
    ///
    /// 读到 `size` 字节或文件末尾为止, 末尾的短读不是错误, 0 表示已到末尾.
    /// `size` 大于 `buf` 长度时返回 `InvalidArgument`.
    pub fn fill(&mut self, buf: &mut [u8], size: usize) -> EncappResult<usize> {
        if size > buf.len() {
            return Err(EncappError::InvalidArgument(format!(
                "读取大小 {size} 超出缓冲区长度 {}",
                buf.len()
            )));
        }

        let target = &mut buf[..size];
        let mut filled = 0;
        while filled < size {
            match self.inner.read(&mut target[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.total_read += filled as u64;
        if filled < size {
            debug!("文件末尾短读: 请求 {size}, 实际 {filled}");
        }
        Ok(filled)
    }

    /// 读取完整的一帧
    ///
    /// 恰好在帧边界到达文件末尾时返回 `None`, 末尾不足一帧的残余数据也返回 `None`
    /// 并记录日志.
    pub fn read_frame(&mut self, frame_size: usize) -> EncappResult<Option<Vec<u8>>> {
        if frame_size == 0 {
            return Err(EncappError::InvalidArgument("帧大小不能为 0".into()));
        }
        let mut frame = vec![0u8; frame_size];
        let n = self.fill(&mut frame, frame_size)?;
        if n == frame_size {
            Ok(Some(frame))
        } else {
            if n > 0 {
                log::warn!("文件末尾残余 {n} 字节不足一帧 ({frame_size}), 已丢弃");
            }
            Ok(None)
        }
    }

    /// 关闭读取器
    pub fn close(self) {
        debug!("关闭原始帧文件: 共读取 {} 字节", self.total_read);
    }
}
