//! 已同步的 Ogg 页面.

use bytes::Bytes;
use vorbis_dec_core::{DecodeError, DecodeResult};

/// Ogg 同步字 (capture pattern)
pub const OGG_SYNC: &[u8; 4] = b"OggS";
/// 固定头部长度 (不含段表)
pub const HEADER_LEN: usize = 27;
/// CRC 字段在头部中的偏移
pub const CRC_OFFSET: usize = 22;
/// 单页最多段数
pub const MAX_SEGMENTS: usize = 255;

/// 页面头部标志
pub const FLAG_CONTINUED: u8 = 0x01;
pub const FLAG_BOS: u8 = 0x02;
pub const FLAG_EOS: u8 = 0x04;

/// 一个完整且通过校验的 Ogg 页面
#[derive(Debug, Clone)]
pub struct Page {
    header_type: u8,
    granule_pos: i64,
    serial_no: u32,
    sequence_no: u32,
    segment_table: Vec<u8>,
    body: Bytes,
}

impl Page {
    /// 从完整页面字节 (头部 + 段表 + 数据) 解析页面.
    ///
    /// 不做 CRC 校验, 由 [`crate::SyncState`] 在切出页面时负责.
    pub fn parse(raw: &[u8]) -> DecodeResult<Self> {
        if raw.len() < HEADER_LEN || &raw[0..4] != OGG_SYNC {
            return Err(DecodeError::InvalidData("Ogg 页面同步字无效".into()));
        }
        if raw[4] != 0 {
            return Err(DecodeError::InvalidData(format!(
                "不支持的 Ogg 版本: {}",
                raw[4]
            )));
        }

        let num_segments = raw[26] as usize;
        let header_len = HEADER_LEN + num_segments;
        if raw.len() < header_len {
            return Err(DecodeError::InvalidData("Ogg 段表被截断".into()));
        }
        let segment_table = raw[HEADER_LEN..header_len].to_vec();
        let body_len: usize = segment_table.iter().map(|&s| s as usize).sum();
        if raw.len() < header_len + body_len {
            return Err(DecodeError::InvalidData(format!(
                "Ogg 页面数据被截断: 需要 {} 字节, 实际 {}",
                header_len + body_len,
                raw.len(),
            )));
        }

        let granule_pos = i64::from_le_bytes([
            raw[6], raw[7], raw[8], raw[9], raw[10], raw[11], raw[12], raw[13],
        ]);
        let serial_no = u32::from_le_bytes([raw[14], raw[15], raw[16], raw[17]]);
        let sequence_no = u32::from_le_bytes([raw[18], raw[19], raw[20], raw[21]]);

        Ok(Self {
            header_type: raw[5],
            granule_pos,
            serial_no,
            sequence_no,
            segment_table,
            body: Bytes::copy_from_slice(&raw[header_len..header_len + body_len]),
        })
    }

    /// 逻辑流序列号
    pub fn serial_no(&self) -> u32 {
        self.serial_no
    }

    /// 页面序号
    pub fn sequence_no(&self) -> u32 {
        self.sequence_no
    }

    /// 粒度位置, -1 表示本页没有包完成
    pub fn granule_pos(&self) -> i64 {
        self.granule_pos
    }

    /// 是否为 BOS (beginning of stream) 页面
    pub fn is_bos(&self) -> bool {
        self.header_type & FLAG_BOS != 0
    }

    /// 是否为 EOS (end of stream) 页面
    pub fn is_eos(&self) -> bool {
        self.header_type & FLAG_EOS != 0
    }

    /// 是否为续延页面 (首段属于前一页未完成的包)
    pub fn is_continued(&self) -> bool {
        self.header_type & FLAG_CONTINUED != 0
    }

    /// 段表
    pub fn segment_table(&self) -> &[u8] {
        &self.segment_table
    }

    /// 页面数据
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
