//! Ogg 逻辑流状态: 把页面拼装成数据包.
//!
//! 段表中连续的 255 段与随后的一个非 255 段组成一个完整 packet,
//! 以 255 结尾的页面表示 packet 延续到下一页.

use std::collections::VecDeque;

use bytes::Bytes;
use log::debug;
use vorbis_dec_core::{DecodeError, DecodeResult};

use crate::packet::OggPacket;
use crate::page::Page;

/// 一次取包的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketOut {
    /// 当前没有完整数据包
    None,
    /// 页面丢失或续包缺少起始片段, 此处存在空洞
    Hole,
    /// 一个完整数据包
    Packet(OggPacket),
}

/// 单个逻辑流的拼包状态
#[derive(Debug)]
pub struct StreamState {
    serial_no: u32,
    /// 跨页面累积的未完成 packet
    partial: Vec<u8>,
    /// 上一页是否以 255 段结尾 (partial 有待续数据)
    partial_open: bool,
    /// 期望的下一页序号
    expected_sequence: Option<u32>,
    /// 是否尚未输出第一个 packet
    first_packet: bool,
    packet_no: i64,
    queue: VecDeque<PacketOut>,
    eos: bool,
}

impl StreamState {
    /// 为指定序列号的逻辑流创建拼包状态
    pub fn new(serial_no: u32) -> Self {
        Self {
            serial_no,
            partial: Vec::new(),
            partial_open: false,
            expected_sequence: None,
            first_packet: true,
            packet_no: 0,
            queue: VecDeque::new(),
            eos: false,
        }
    }

    /// 逻辑流序列号
    pub fn serial_no(&self) -> u32 {
        self.serial_no
    }

    /// 是否已收到 EOS 页面
    pub fn is_eos(&self) -> bool {
        self.eos
    }

    /// 丢弃全部拼包状态, 保留序列号
    pub fn reset(&mut self) {
        *self = Self::new(self.serial_no);
    }

    /// 送入一个页面.
    ///
    /// 序列号不匹配时返回错误, 页面不被消费.
    pub fn page_in(&mut self, page: &Page) -> DecodeResult<()> {
        if page.serial_no() != self.serial_no {
            return Err(DecodeError::InvalidData(format!(
                "Ogg 页面序列号不匹配: 期望 {}, 实际 {}",
                self.serial_no,
                page.serial_no(),
            )));
        }

        if let Some(expected) = self.expected_sequence {
            if page.sequence_no() != expected {
                debug!(
                    "Ogg: 流 {} 页面序号断裂: 期望 {}, 实际 {}",
                    self.serial_no,
                    expected,
                    page.sequence_no(),
                );
                self.mark_hole();
            }
        }
        self.expected_sequence = Some(page.sequence_no().wrapping_add(1));

        let segments = page.segment_table();
        let body = page.body();
        let mut seg_idx = 0usize;
        let mut offset = 0usize;

        if page.is_continued() {
            if !self.partial_open {
                // 续包缺少起始片段, 整包丢弃直到首个完成段
                while seg_idx < segments.len() {
                    let val = segments[seg_idx] as usize;
                    offset += val;
                    seg_idx += 1;
                    if val < 255 {
                        break;
                    }
                }
                debug!(
                    "Ogg: 流 {} 遇到无头续包, 丢弃 {} 字节",
                    self.serial_no, offset,
                );
            }
        } else if self.partial_open {
            // 上一页声明包未结束, 但本页不是续页
            debug!(
                "Ogg: 流 {} 续页缺失, 丢弃 {} 字节残片",
                self.serial_no,
                self.partial.len(),
            );
            self.mark_hole();
        }

        let mut completed = Vec::new();
        while seg_idx < segments.len() {
            let val = segments[seg_idx] as usize;
            self.partial.extend_from_slice(&body[offset..offset + val]);
            offset += val;
            seg_idx += 1;
            if val < 255 {
                completed.push(Bytes::from(std::mem::take(&mut self.partial)));
                self.partial_open = false;
            } else {
                self.partial_open = true;
            }
        }

        let last = completed.len();
        for (i, data) in completed.into_iter().enumerate() {
            let is_last = i + 1 == last;
            let packet = OggPacket {
                data,
                bos: self.first_packet && page.is_bos(),
                eos: is_last && page.is_eos(),
                granule_pos: if is_last { page.granule_pos() } else { -1 },
                packet_no: self.packet_no,
            };
            self.first_packet = false;
            self.packet_no += 1;
            self.queue.push_back(PacketOut::Packet(packet));
        }

        if page.is_eos() {
            self.eos = true;
        }
        Ok(())
    }

    /// 取出下一个数据包或空洞标记
    pub fn packet_out(&mut self) -> PacketOut {
        self.queue.pop_front().unwrap_or(PacketOut::None)
    }

    /// 丢弃残片并在队列中记录一个空洞
    fn mark_hole(&mut self) {
        self.partial.clear();
        self.partial_open = false;
        self.packet_no += 1;
        self.queue.push_back(PacketOut::Hole);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{PageOut, SyncState};
    use crate::writer::PageWriter;

    fn pages_of(bytes: &[u8]) -> Vec<Page> {
        let mut sync = SyncState::new();
        sync.feed(bytes);
        let mut pages = Vec::new();
        while let PageOut::Page(p) = sync.page_out() {
            pages.push(p);
        }
        pages
    }

    fn drain(stream: &mut StreamState) -> Vec<PacketOut> {
        let mut out = Vec::new();
        loop {
            match stream.packet_out() {
                PacketOut::None => break,
                other => out.push(other),
            }
        }
        out
    }

    #[test]
    fn test_单页多包与粒度分配() {
        let mut writer = PageWriter::new(7);
        writer.push_packet(&[1u8; 10], 100);
        writer.push_packet(&[2u8; 20], 200);
        writer.push_packet(&[3u8; 30], 300);
        let pages = pages_of(&writer.flush(true));
        assert_eq!(pages.len(), 1);

        let mut stream = StreamState::new(7);
        stream.page_in(&pages[0]).unwrap();
        let out = drain(&mut stream);
        assert_eq!(out.len(), 3);
        match (&out[0], &out[2]) {
            (PacketOut::Packet(first), PacketOut::Packet(last)) => {
                assert!(first.bos);
                assert_eq!(first.granule_pos, -1);
                assert_eq!(first.data.len(), 10);
                assert!(last.eos);
                assert_eq!(last.granule_pos, 300);
                assert_eq!(last.packet_no, 2);
            }
            _ => panic!("期望数据包"),
        }
        assert!(stream.is_eos());
    }

    #[test]
    fn test_跨页大包拼装() {
        let mut writer = PageWriter::new(9);
        writer.push_packet(&vec![0x5Au8; 255 * 300], 1000);
        let pages = pages_of(&writer.flush(false));
        assert_eq!(pages.len(), 2);
        assert!(pages[1].is_continued());

        let mut stream = StreamState::new(9);
        stream.page_in(&pages[0]).unwrap();
        assert_eq!(stream.packet_out(), PacketOut::None);
        stream.page_in(&pages[1]).unwrap();
        match stream.packet_out() {
            PacketOut::Packet(p) => {
                assert_eq!(p.data.len(), 255 * 300);
                assert_eq!(p.granule_pos, 1000);
            }
            other => panic!("期望数据包, 实际 {other:?}"),
        }
    }

    #[test]
    fn test_页面丢失产生空洞() {
        let mut writer = PageWriter::new(3);
        let mut pages = Vec::new();
        for i in 0..3 {
            writer.push_packet(&[i as u8; 16], i as i64);
            pages.extend(pages_of(&writer.flush(false)));
        }

        let mut stream = StreamState::new(3);
        stream.page_in(&pages[0]).unwrap();
        stream.page_in(&pages[2]).unwrap();
        let out = drain(&mut stream);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], PacketOut::Hole);
        assert!(matches!(&out[2], PacketOut::Packet(p) if p.data[0] == 2));
    }

    #[test]
    fn test_无头续包被丢弃() {
        let mut writer = PageWriter::new(5);
        writer.push_packet(&vec![1u8; 255 * 300], 10);
        writer.push_packet(&[9u8; 4], 20);
        let pages = pages_of(&writer.flush(false));
        assert_eq!(pages.len(), 2);

        // 只送入第二页: 首段属于缺失起始部分的包
        let mut stream = StreamState::new(5);
        stream.page_in(&pages[1]).unwrap();
        let out = drain(&mut stream);
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], PacketOut::Packet(p) if p.data[..] == [9u8; 4]));
    }

    #[test]
    fn test_序列号不匹配() {
        let mut writer = PageWriter::new(1);
        writer.push_packet(&[0u8; 4], 0);
        let pages = pages_of(&writer.flush(false));
        let mut stream = StreamState::new(2);
        assert!(stream.page_in(&pages[0]).is_err());
        assert_eq!(stream.packet_out(), PacketOut::None);
    }
}
