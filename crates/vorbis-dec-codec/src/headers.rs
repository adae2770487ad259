//! Vorbis 三个头包 (identification / comment / setup) 的解析与协商.
//!
//! 头包必须按顺序到达. identification 阶段的失败意味着码流不是 Vorbis,
//! 之后两个头包的失败视为次级头损坏.

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use log::debug;
use vorbis_dec_core::{DecodeError, DecodeResult};
use vorbis_dec_ogg::OggPacket;

const VORBIS_MAGIC: &[u8; 6] = b"vorbis";

const PACKET_IDENTIFICATION: u8 = 0x01;
const PACKET_COMMENT: u8 = 0x03;
const PACKET_SETUP: u8 = 0x05;

/// identification 头包中的解码参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
    pub version: u32,
    pub channels: u8,
    pub sample_rate: u32,
    pub bitrate_upper: i32,
    pub bitrate_nominal: i32,
    pub bitrate_lower: i32,
    /// 短块长度 (样本数)
    pub blocksize_short: u16,
    /// 长块长度 (样本数)
    pub blocksize_long: u16,
}

/// comment 头包内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecComment {
    pub vendor: String,
    pub comments: Vec<String>,
}

/// 合成后端初始化所需的原始头包
#[derive(Debug, Clone)]
pub struct HeaderPackets {
    pub identification: Bytes,
    pub setup: Bytes,
}

/// 协商进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStage {
    Identification,
    Comment,
    Setup,
    Complete,
}

/// 协商完成后的结果
#[derive(Debug, Clone)]
pub struct NegotiatedHeaders {
    pub info: CodecInfo,
    pub comment: CodecComment,
    pub packets: HeaderPackets,
}

/// 头包协商器
#[derive(Debug)]
pub struct HeaderNegotiator {
    stage: HeaderStage,
    info: Option<CodecInfo>,
    comment: Option<CodecComment>,
    identification: Option<Bytes>,
    setup: Option<Bytes>,
}

impl Default for HeaderNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderNegotiator {
    pub fn new() -> Self {
        Self {
            stage: HeaderStage::Identification,
            info: None,
            comment: None,
            identification: None,
            setup: None,
        }
    }

    /// 当前等待的头包
    pub fn stage(&self) -> HeaderStage {
        self.stage
    }

    /// 已接受的头包数量
    pub fn accepted(&self) -> usize {
        match self.stage {
            HeaderStage::Identification => 0,
            HeaderStage::Comment => 1,
            HeaderStage::Setup => 2,
            HeaderStage::Complete => 3,
        }
    }

    /// 送入下一个头包, 返回新的协商进度
    pub fn accept(&mut self, packet: &OggPacket) -> DecodeResult<HeaderStage> {
        let data = &packet.data[..];
        match self.stage {
            HeaderStage::Identification => {
                if !packet.bos {
                    return Err(DecodeError::NotCodecAudio(
                        "identification 头包不是逻辑流首包".into(),
                    ));
                }
                let info = parse_identification_header(data).map_err(not_codec_audio)?;
                debug!(
                    "Vorbis: identification 头: {} 声道, {} Hz, blocksize {}/{}",
                    info.channels, info.sample_rate, info.blocksize_short, info.blocksize_long,
                );
                self.info = Some(info);
                self.identification = Some(packet.data.clone());
                self.stage = HeaderStage::Comment;
            }
            HeaderStage::Comment => {
                let comment = parse_comment_header(data).map_err(corrupt_secondary)?;
                debug!(
                    "Vorbis: comment 头: vendor={:?}, {} 条注释",
                    comment.vendor,
                    comment.comments.len(),
                );
                self.comment = Some(comment);
                self.stage = HeaderStage::Setup;
            }
            HeaderStage::Setup => {
                check_common_header(data, PACKET_SETUP, "setup").map_err(corrupt_secondary)?;
                self.setup = Some(packet.data.clone());
                self.stage = HeaderStage::Complete;
            }
            HeaderStage::Complete => {
                return Err(DecodeError::InvalidData("Vorbis 头包已全部接受".into()));
            }
        }
        Ok(self.stage)
    }

    /// 取出协商结果, 未完成时返回错误
    pub fn finish(self) -> DecodeResult<NegotiatedHeaders> {
        match (self.info, self.comment, self.identification, self.setup) {
            (Some(info), Some(comment), Some(identification), Some(setup)) => {
                Ok(NegotiatedHeaders {
                    info,
                    comment,
                    packets: HeaderPackets {
                        identification,
                        setup,
                    },
                })
            }
            _ => Err(DecodeError::TruncatedHeaders),
        }
    }
}

fn not_codec_audio(e: DecodeError) -> DecodeError {
    DecodeError::NotCodecAudio(e.to_string())
}

fn corrupt_secondary(e: DecodeError) -> DecodeError {
    DecodeError::CorruptSecondaryHeader(e.to_string())
}

/// 检查头包类型字节与 "vorbis" 标识
fn check_common_header(packet: &[u8], packet_type: u8, what: &str) -> DecodeResult<()> {
    if packet.len() < 7 {
        return Err(DecodeError::InvalidData(format!(
            "Vorbis {what} 头包长度不足: {}",
            packet.len(),
        )));
    }
    if packet[0] != packet_type || &packet[1..7] != VORBIS_MAGIC {
        return Err(DecodeError::InvalidData(format!(
            "Vorbis {what} 头包标识无效: type=0x{:02X}",
            packet[0],
        )));
    }
    Ok(())
}

/// identification 头包固定长度
const IDENTIFICATION_LEN: usize = 30;

/// 解析 identification 头包.
///
/// 布局: 公共头 7 字节, 之后依次为 version(u32) channels(u8) rate(u32)
/// 三个码率(i32) blocksize 指数(u8) framing(u8), 全部小端.
pub fn parse_identification_header(packet: &[u8]) -> DecodeResult<CodecInfo> {
    check_common_header(packet, PACKET_IDENTIFICATION, "identification")?;
    let Some(fields) = packet.get(7..IDENTIFICATION_LEN) else {
        return Err(DecodeError::InvalidData(format!(
            "Vorbis identification 头包仅 {} 字节",
            packet.len(),
        )));
    };

    let version = LittleEndian::read_u32(&fields[0..4]);
    let channels = fields[4];
    let sample_rate = LittleEndian::read_u32(&fields[5..9]);
    let bitrate_upper = LittleEndian::read_i32(&fields[9..13]);
    let bitrate_nominal = LittleEndian::read_i32(&fields[13..17]);
    let bitrate_lower = LittleEndian::read_i32(&fields[17..21]);
    let (short_exp, long_exp) = (fields[21] & 0x0F, fields[21] >> 4);
    let framing = fields[22];

    if version != 0 {
        return Err(DecodeError::InvalidData(format!(
            "Vorbis 版本不支持: {version}"
        )));
    }
    if channels == 0 || sample_rate == 0 {
        return Err(DecodeError::InvalidData(format!(
            "Vorbis 流参数非法: {channels} 声道, {sample_rate} Hz"
        )));
    }
    // 短块 64..=8192, 长块不小于短块
    if !(6..=13).contains(&short_exp) || !(short_exp..=13).contains(&long_exp) {
        return Err(DecodeError::InvalidData(format!(
            "Vorbis blocksize 非法: 2^{short_exp} / 2^{long_exp}"
        )));
    }
    if framing & 0x01 == 0 {
        return Err(DecodeError::InvalidData(
            "Vorbis identification 头包缺少 framing 位".into(),
        ));
    }

    Ok(CodecInfo {
        version,
        channels,
        sample_rate,
        bitrate_upper,
        bitrate_nominal,
        bitrate_lower,
        blocksize_short: 1u16 << short_exp,
        blocksize_long: 1u16 << long_exp,
    })
}

/// 解析 comment 头包
pub fn parse_comment_header(packet: &[u8]) -> DecodeResult<CodecComment> {
    check_common_header(packet, PACKET_COMMENT, "comment")?;

    let mut reader = FieldReader::new(&packet[7..]);
    let vendor = reader.string("vendor")?;
    let count = reader.u32("comment 数量")? as usize;
    // 每条注释至少有 4 字节长度前缀
    if count > reader.remaining() / 4 {
        return Err(DecodeError::InvalidData(format!(
            "Vorbis comment 数量 {count} 超出头包剩余 {} 字节",
            reader.remaining(),
        )));
    }
    let comments = (0..count)
        .map(|_| reader.string("comment 项"))
        .collect::<DecodeResult<Vec<_>>>()?;

    if reader.take(1, "framing")?[0] & 0x01 == 0 {
        return Err(DecodeError::InvalidData(
            "Vorbis comment 头包缺少 framing 位".into(),
        ));
    }

    Ok(CodecComment { vendor, comments })
}

/// 头包中长度前缀字段的顺序读取
struct FieldReader<'a> {
    data: &'a [u8],
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn remaining(&self) -> usize {
        self.data.len()
    }

    fn take(&mut self, n: usize, what: &str) -> DecodeResult<&'a [u8]> {
        if n > self.data.len() {
            return Err(DecodeError::InvalidData(format!(
                "Vorbis comment 头包截断: {what} 需要 {n} 字节, 剩余 {}",
                self.data.len(),
            )));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn u32(&mut self, what: &str) -> DecodeResult<u32> {
        self.take(4, what).map(LittleEndian::read_u32)
    }

    fn string(&mut self, what: &str) -> DecodeResult<String> {
        let len = self.u32(what)? as usize;
        let bytes = self.take(len, what)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
