//! Ogg 页面写出器.
//!
//! 把 packet 按 lacing 规则切分进页面并计算 CRC. 用于构造测试码流与夹具,
//! 解码路径本身不依赖它.

use vorbis_dec_core::crc::crc32;

use crate::page::{CRC_OFFSET, FLAG_BOS, FLAG_CONTINUED, FLAG_EOS, MAX_SEGMENTS, OGG_SYNC};

/// 单个逻辑流的页面写出器
#[derive(Debug)]
pub struct PageWriter {
    serial_no: u32,
    sequence_no: u32,
    /// 待写出的 lacing 值
    lacing: Vec<u8>,
    /// 与 lacing 一一对应, 包的最后一段携带包粒度, 其余为 -1
    granules: Vec<i64>,
    body: Vec<u8>,
    /// 下一页首段是否属于未写完的包
    continued: bool,
    bos_written: bool,
}

impl PageWriter {
    /// 创建写出器
    pub fn new(serial_no: u32) -> Self {
        Self {
            serial_no,
            sequence_no: 0,
            lacing: Vec::new(),
            granules: Vec::new(),
            body: Vec::new(),
            continued: false,
            bos_written: false,
        }
    }

    /// 下一页的页面序号
    pub fn sequence_no(&self) -> u32 {
        self.sequence_no
    }

    /// 追加一个 packet, 其粒度位置为 `granule_pos`
    pub fn push_packet(&mut self, data: &[u8], granule_pos: i64) {
        let mut remaining = data.len();
        while remaining >= 255 {
            self.lacing.push(255);
            self.granules.push(-1);
            remaining -= 255;
        }
        self.lacing.push(remaining as u8);
        self.granules.push(granule_pos);
        self.body.extend_from_slice(data);
    }

    /// 把全部待写数据输出为一个或多个页面.
    ///
    /// 每页最多 255 段. `eos` 为真时最后一页带 EOS 标志;
    /// 没有待写数据且 `eos` 为真时输出一个空 EOS 页.
    pub fn flush(&mut self, eos: bool) -> Vec<u8> {
        let mut out = Vec::new();
        if self.lacing.is_empty() {
            if eos {
                self.write_page(&mut out, &[], -1, &[], true);
            }
            return out;
        }

        let lacing = std::mem::take(&mut self.lacing);
        let granules = std::mem::take(&mut self.granules);
        let body = std::mem::take(&mut self.body);

        let mut body_pos = 0usize;
        for (chunk_idx, segments) in lacing.chunks(MAX_SEGMENTS).enumerate() {
            let seg_start = chunk_idx * MAX_SEGMENTS;
            let body_len: usize = segments.iter().map(|&s| s as usize).sum();
            // 页面粒度取本页最后一个完成包的粒度
            let granule = segments
                .iter()
                .zip(&granules[seg_start..seg_start + segments.len()])
                .rev()
                .find(|(seg, _)| **seg < 255)
                .map_or(-1, |(_, &g)| g);
            let last = seg_start + segments.len() == lacing.len();

            self.write_page(
                &mut out,
                segments,
                granule,
                &body[body_pos..body_pos + body_len],
                eos && last,
            );
            self.continued = segments.last() == Some(&255);
            body_pos += body_len;
        }
        out
    }

    fn write_page(&mut self, out: &mut Vec<u8>, segments: &[u8], granule: i64, body: &[u8], eos: bool) {
        let mut header_type = 0u8;
        if self.continued {
            header_type |= FLAG_CONTINUED;
        }
        if !self.bos_written {
            header_type |= FLAG_BOS;
            self.bos_written = true;
        }
        if eos {
            header_type |= FLAG_EOS;
        }

        let mut page = Vec::with_capacity(27 + segments.len() + body.len());
        page.extend_from_slice(OGG_SYNC);
        page.push(0);
        page.push(header_type);
        page.extend_from_slice(&granule.to_le_bytes());
        page.extend_from_slice(&self.serial_no.to_le_bytes());
        page.extend_from_slice(&self.sequence_no.to_le_bytes());
        page.extend_from_slice(&0u32.to_le_bytes());
        page.push(segments.len() as u8);
        page.extend_from_slice(segments);
        page.extend_from_slice(body);

        // CRC 字段按 0 参与计算, 当前已为 0
        let crc = crc32(&page);
        page[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());

        out.extend_from_slice(&page);
        self.sequence_no = self.sequence_no.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_首页带_bos_后续页不带() {
        let mut writer = PageWriter::new(11);
        writer.push_packet(&[1, 2, 3], 0);
        let first = writer.flush(false);
        writer.push_packet(&[4, 5, 6], 64);
        let second = writer.flush(false);
        assert_eq!(first[5] & FLAG_BOS, FLAG_BOS);
        assert_eq!(second[5] & FLAG_BOS, 0);
        assert_eq!(writer.sequence_no(), 2);
    }

    #[test]
    fn test_恰为_255_倍数的包以零段结尾() {
        let mut writer = PageWriter::new(1);
        writer.push_packet(&[0u8; 510], 7);
        let page = writer.flush(false);
        assert_eq!(page[26], 3);
        assert_eq!(&page[27..30], &[255, 255, 0]);
    }

    #[test]
    fn test_超过_255_段拆成续页() {
        let mut writer = PageWriter::new(1);
        writer.push_packet(&vec![0u8; 255 * 300], 99);
        let pages = writer.flush(true);
        let first_len = 27 + 255 + 255 * 255;
        // 第一页无完成包, 粒度为 -1
        assert_eq!(&pages[6..14], &(-1i64).to_le_bytes());
        let second = &pages[first_len..];
        assert_eq!(second[5] & FLAG_CONTINUED, FLAG_CONTINUED);
        assert_eq!(second[5] & FLAG_EOS, FLAG_EOS);
        assert_eq!(&second[6..14], &99i64.to_le_bytes());
    }

    #[test]
    fn test_空_flush_只在_eos_时输出() {
        let mut writer = PageWriter::new(1);
        assert!(writer.flush(false).is_empty());
        let eos = writer.flush(true);
        assert_eq!(eos.len(), 27);
        assert_eq!(eos[5] & FLAG_EOS, FLAG_EOS);
    }
}
