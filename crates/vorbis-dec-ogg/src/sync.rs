//! Ogg 页面同步器 (推模式).
//!
//! 调用方通过 [`SyncState::buffer`] + [`SyncState::wrote`] (或 [`SyncState::feed`])
//! 写入任意长度的字节, 再用 [`SyncState::page_out`] 逐页切出.
//! 不完整的尾部字节保留在内部缓冲区, 等待后续写入.

use log::debug;
use vorbis_dec_core::crc::crc32_update;
use vorbis_dec_core::{DecodeError, DecodeResult};

use crate::page::{CRC_OFFSET, HEADER_LEN, OGG_SYNC, Page};

/// 一次取页的结果
#[derive(Debug)]
pub enum PageOut {
    /// 需要更多字节
    NeedMore,
    /// 丢弃了若干无法同步的字节 (损坏或非 Ogg 数据), 可继续取页
    Skipped(usize),
    /// 成功切出一个页面
    Page(Page),
}

/// 单次扫描的内部结果
enum Seek {
    NeedMore,
    Skip(usize),
    Page(usize),
}

/// Ogg 页面同步状态
#[derive(Debug)]
pub struct SyncState {
    /// 内部存储, `[returned, fill)` 为未消费字节
    data: Vec<u8>,
    fill: usize,
    returned: usize,
    /// 自上次成功取页后是否已上报过失步
    unsynced: bool,
    verify_crc: bool,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    /// 创建同步器 (启用 CRC 校验)
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            fill: 0,
            returned: 0,
            unsynced: false,
            verify_crc: true,
        }
    }

    /// 设置是否校验页面 CRC
    pub fn with_crc_check(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    /// 申请一段至少 `size` 字节的可写区域.
    ///
    /// 已消费的字节在此时被回收. 写入后必须调用 [`SyncState::wrote`].
    pub fn buffer(&mut self, size: usize) -> &mut [u8] {
        if self.returned > 0 {
            self.data.copy_within(self.returned..self.fill, 0);
            self.fill -= self.returned;
            self.returned = 0;
        }
        if self.data.len() < self.fill + size {
            self.data.resize(self.fill + size, 0);
        }
        &mut self.data[self.fill..self.fill + size]
    }

    /// 确认向 [`SyncState::buffer`] 返回的区域写入了 `bytes` 字节
    pub fn wrote(&mut self, bytes: usize) -> DecodeResult<()> {
        if self.fill + bytes > self.data.len() {
            return Err(DecodeError::InvalidData(format!(
                "Ogg 同步器写入越界: fill={}, wrote={}, capacity={}",
                self.fill,
                bytes,
                self.data.len(),
            )));
        }
        self.fill += bytes;
        Ok(())
    }

    /// 写入一段字节 (buffer + 拷贝 + wrote)
    pub fn feed(&mut self, bytes: &[u8]) {
        let len = bytes.len();
        self.buffer(len).copy_from_slice(bytes);
        self.fill += len;
    }

    /// 尚未消费的字节数
    pub fn buffered(&self) -> usize {
        self.fill - self.returned
    }

    /// 丢弃全部缓冲数据, 恢复初始状态
    pub fn reset(&mut self) {
        self.fill = 0;
        self.returned = 0;
        self.unsynced = false;
    }

    /// 取出下一个页面.
    ///
    /// 失步时只上报一次 [`PageOut::Skipped`], 随后的连续失步字节被静默丢弃,
    /// 直到重新同步或需要更多数据.
    pub fn page_out(&mut self) -> PageOut {
        let mut skipped = 0usize;
        loop {
            match self.page_seek() {
                Seek::Page(len) => {
                    let start = self.returned;
                    self.returned += len;
                    self.unsynced = false;
                    return match Page::parse(&self.data[start..start + len]) {
                        Ok(page) => PageOut::Page(page),
                        Err(e) => {
                            debug!("Ogg: 已校验页面解析失败, 丢弃 {} 字节: {}", len, e);
                            PageOut::Skipped(len)
                        }
                    };
                }
                Seek::NeedMore => {
                    if skipped > 0 {
                        return PageOut::Skipped(skipped);
                    }
                    return PageOut::NeedMore;
                }
                Seek::Skip(n) => {
                    self.returned += n;
                    skipped += n;
                    if !self.unsynced {
                        self.unsynced = true;
                        return PageOut::Skipped(skipped);
                    }
                }
            }
        }
    }

    /// 检查当前位置是否为完整有效页面
    fn page_seek(&self) -> Seek {
        let avail = &self.data[self.returned..self.fill];
        if avail.len() < HEADER_LEN {
            return Seek::NeedMore;
        }
        if &avail[0..4] != OGG_SYNC || avail[4] != 0 {
            return Self::skip_to_capture(avail);
        }

        let header_len = HEADER_LEN + avail[26] as usize;
        if avail.len() < header_len {
            return Seek::NeedMore;
        }
        let body_len: usize = avail[HEADER_LEN..header_len]
            .iter()
            .map(|&s| s as usize)
            .sum();
        let total = header_len + body_len;
        if avail.len() < total {
            return Seek::NeedMore;
        }

        if self.verify_crc {
            let stored = u32::from_le_bytes([
                avail[CRC_OFFSET],
                avail[CRC_OFFSET + 1],
                avail[CRC_OFFSET + 2],
                avail[CRC_OFFSET + 3],
            ]);
            let mut crc = crc32_update(0, &avail[..CRC_OFFSET]);
            crc = crc32_update(crc, &[0u8; 4]);
            crc = crc32_update(crc, &avail[CRC_OFFSET + 4..total]);
            if crc != stored {
                debug!(
                    "Ogg: 页面 CRC 校验失败: 读取=0x{stored:08X}, 计算=0x{crc:08X}"
                );
                return Self::skip_to_capture(avail);
            }
        }

        Seek::Page(total)
    }

    /// 跳到下一个可能的同步字起点
    fn skip_to_capture(avail: &[u8]) -> Seek {
        let next = avail[1..]
            .iter()
            .position(|&b| b == OGG_SYNC[0])
            .map_or(avail.len(), |p| p + 1);
        Seek::Skip(next)
    }
}
