//! 页面/数据包泵.
//!
//! 把一次调用的输入按固定窗口送入页面同步器, 切出的页面交给逻辑流拼包,
//! 以惰性迭代器的形式逐个产出数据包. 同步器中已缓冲的页面优先于新输入.

use log::{debug, warn};
use vorbis_dec_ogg::{OggPacket, PacketOut, Page, PageOut, StreamState, SyncState};

use crate::stats::DecodeStats;

/// 按固定窗口切分输入
#[derive(Debug)]
pub(crate) struct WindowFeeder<'a> {
    input: &'a [u8],
    offset: usize,
    window: usize,
}

impl<'a> WindowFeeder<'a> {
    pub(crate) fn new(input: &'a [u8], window: usize) -> Self {
        Self {
            input,
            offset: 0,
            window,
        }
    }

    /// 送入下一个窗口, 返回送入的字节数 (0 表示输入已耗尽)
    pub(crate) fn feed_next(&mut self, sync: &mut SyncState) -> usize {
        let bytes = self.window.min(self.input.len() - self.offset);
        if bytes > 0 {
            sync.feed(&self.input[self.offset..self.offset + bytes]);
            self.offset += bytes;
        }
        bytes
    }

    /// 已送入同步器的字节数
    pub(crate) fn consumed(&self) -> usize {
        self.offset
    }
}

/// 泵产出的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpEvent {
    /// 一个完整数据包
    Packet(OggPacket),
    /// 拼包空洞, 其位置的数据包已丢失
    Hole,
}

/// 当前输入窗口上的数据包序列.
///
/// 序列是有限且不可重启的: 输入耗尽或消费完 EOS 页面后即结束.
pub struct PacketPump<'a> {
    sync: &'a mut SyncState,
    stream: &'a mut StreamState,
    feeder: WindowFeeder<'a>,
    stats: &'a mut DecodeStats,
    eos: bool,
    done: bool,
}

impl<'a> PacketPump<'a> {
    pub fn new(
        sync: &'a mut SyncState,
        stream: &'a mut StreamState,
        input: &'a [u8],
        window: usize,
        stats: &'a mut DecodeStats,
    ) -> Self {
        Self {
            sync,
            stream,
            feeder: WindowFeeder::new(input, window),
            stats,
            eos: false,
            done: false,
        }
    }

    /// 是否已消费带 EOS 标志的页面
    pub fn reached_eos(&self) -> bool {
        self.eos
    }

    /// 处理一个页面, 其他逻辑流的页面被忽略
    fn take_page(&mut self, page: Page) {
        if page.serial_no() != self.stream.serial_no() {
            self.stats.foreign_pages += 1;
            debug!(
                "Ogg: 忽略逻辑流 {} 的页面 (当前流 {})",
                page.serial_no(),
                self.stream.serial_no(),
            );
            return;
        }
        if let Err(e) = self.stream.page_in(&page) {
            warn!("Ogg: 页面送入逻辑流失败, 已跳过: {e}");
            return;
        }
        if page.is_eos() {
            debug!("Ogg: 流 {} 到达 EOS 页面", self.stream.serial_no());
            self.eos = true;
        }
    }
}

impl Iterator for PacketPump<'_> {
    type Item = PumpEvent;

    fn next(&mut self) -> Option<PumpEvent> {
        loop {
            match self.stream.packet_out() {
                PacketOut::Packet(packet) => return Some(PumpEvent::Packet(packet)),
                PacketOut::Hole => return Some(PumpEvent::Hole),
                PacketOut::None => {}
            }
            if self.eos || self.done {
                return None;
            }

            match self.sync.page_out() {
                PageOut::Page(page) => self.take_page(page),
                PageOut::Skipped(n) => {
                    self.stats.skip_events += 1;
                    self.stats.skipped_bytes += n as u64;
                    warn!("Ogg: 失步, 跳过 {n} 字节");
                }
                PageOut::NeedMore => {
                    if self.feeder.feed_next(self.sync) == 0 {
                        self.done = true;
                        return None;
                    }
                }
            }
        }
    }
}
