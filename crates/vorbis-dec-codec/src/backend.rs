//! 基于 symphonia 的 Vorbis 合成后端.
//!
//! 码本, floor/residue 与 IMDCT 由 `symphonia-codec-vorbis` 完成;
//! 头部由本 crate 协商, 原始识别头与设置头拼接后作为 extra_data 传入.

use log::trace;
use symphonia_codec_vorbis::VorbisDecoder as SymVorbisDecoder;
use symphonia_core::audio::SampleBuffer;
use symphonia_core::codecs::{
    CODEC_TYPE_VORBIS, CodecParameters as SymCodecParameters, Decoder as SymDecoderTrait,
    DecoderOptions as SymDecoderOptions,
};
use symphonia_core::errors::Error as SymError;
use symphonia_core::formats::Packet as SymPacket;
use vorbis_dec_core::{DecodeError, DecodeResult};
use vorbis_dec_ogg::OggPacket;

use crate::headers::{CodecInfo, HeaderPackets};
use crate::synthesis::{SynthesisBlock, Synthesizer};

/// symphonia Vorbis 合成后端
pub struct SymphoniaSynthesizer {
    decoder: SymVorbisDecoder,
    /// 复用的平面样本缓冲
    sample_buf: Option<SampleBuffer<f32>>,
    next_ts: u64,
}

impl SymphoniaSynthesizer {
    /// 用协商结果创建后端.
    ///
    /// 码本, floor, residue 与 mapping 在这里第一次被完整解析, 解析失败返回
    /// [`DecodeError::CorruptSecondaryHeader`]; 只有后端自身不支持或超出限制时
    /// 才返回 [`DecodeError::SynthesisInit`].
    pub fn new(info: &CodecInfo, packets: &HeaderPackets) -> DecodeResult<Self> {
        let mut extra = Vec::with_capacity(packets.identification.len() + packets.setup.len());
        extra.extend_from_slice(&packets.identification);
        extra.extend_from_slice(&packets.setup);

        let mut params = SymCodecParameters::new();
        params
            .for_codec(CODEC_TYPE_VORBIS)
            .with_sample_rate(info.sample_rate)
            .with_extra_data(extra.into_boxed_slice());

        let decoder = SymVorbisDecoder::try_new(&params, &SymDecoderOptions::default())
            .map_err(map_init_error)?;

        Ok(Self {
            decoder,
            sample_buf: None,
            next_ts: 0,
        })
    }

    /// [`crate::SynthesizerFactory`] 形式的构造入口
    pub fn create(info: &CodecInfo, packets: &HeaderPackets) -> DecodeResult<Box<dyn Synthesizer>> {
        Ok(Box::new(Self::new(info, packets)?))
    }
}

fn map_init_error(e: SymError) -> DecodeError {
    match e {
        SymError::Unsupported(_) | SymError::LimitError(_) | SymError::ResetRequired => {
            DecodeError::SynthesisInit(format!("symphonia vorbis 初始化失败: {e}"))
        }
        // 识别头已通过校验, 其余失败都来自 setup 头内容
        other => DecodeError::CorruptSecondaryHeader(format!("setup 头解析失败: {other}")),
    }
}

impl Synthesizer for SymphoniaSynthesizer {
    fn name(&self) -> &str {
        "symphonia-vorbis"
    }

    fn synthesize(&mut self, packet: &OggPacket, block: &mut SynthesisBlock) -> DecodeResult<()> {
        let sym_pkt = SymPacket::new_from_slice(0, self.next_ts, 0, &packet.data);
        let decoded = self
            .decoder
            .decode(&sym_pkt)
            .map_err(|e| DecodeError::InvalidData(format!("symphonia vorbis 解码失败: {e}")))?;

        let frames = decoded.frames();
        let channels = decoded.spec().channels.count();
        if channels != block.channels() {
            return Err(DecodeError::InvalidData(format!(
                "symphonia 输出声道数不符: 期望 {}, 实际 {}",
                block.channels(),
                channels,
            )));
        }

        let spec = *decoded.spec();
        let capacity = decoded.capacity();
        if self
            .sample_buf
            .as_ref()
            .is_some_and(|buf| buf.capacity() < capacity * channels)
        {
            self.sample_buf = None;
        }
        let sample_buf = self
            .sample_buf
            .get_or_insert_with(|| SampleBuffer::<f32>::new(capacity as u64, spec));
        sample_buf.copy_planar_ref(decoded);
        let samples = sample_buf.samples();

        for (ch, plane) in block.prepare(frames).into_iter().enumerate() {
            plane.copy_from_slice(&samples[ch * frames..(ch + 1) * frames]);
        }

        self.next_ts += frames as u64;
        trace!("Vorbis: 包 #{} 合成 {} 帧", packet.packet_no, frames);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_伪造设置头报告次级头损坏() {
        let mut ident = Vec::new();
        ident.push(1u8);
        ident.extend_from_slice(b"vorbis");
        ident.extend_from_slice(&0u32.to_le_bytes());
        ident.push(2);
        ident.extend_from_slice(&44100u32.to_le_bytes());
        ident.extend_from_slice(&[0u8; 12]);
        ident.push(0xB8);
        ident.push(1);

        let mut setup = vec![5u8];
        setup.extend_from_slice(b"vorbis");
        setup.extend_from_slice(&[0xFFu8; 8]);

        let info = CodecInfo {
            version: 0,
            channels: 2,
            sample_rate: 44100,
            bitrate_upper: 0,
            bitrate_nominal: 0,
            bitrate_lower: 0,
            blocksize_short: 256,
            blocksize_long: 2048,
        };
        let packets = HeaderPackets {
            identification: Bytes::from(ident),
            setup: Bytes::from(setup),
        };
        assert!(matches!(
            SymphoniaSynthesizer::create(&info, &packets),
            Err(DecodeError::CorruptSecondaryHeader(_))
        ));
    }

    #[test]
    fn test_初始化错误分类() {
        assert!(matches!(
            map_init_error(SymError::DecodeError("invalid codebook sync")),
            DecodeError::CorruptSecondaryHeader(_)
        ));
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "end of bitstream");
        assert!(matches!(
            map_init_error(SymError::IoError(eof)),
            DecodeError::CorruptSecondaryHeader(_)
        ));
        assert!(matches!(
            map_init_error(SymError::Unsupported("vorbis: floor type")),
            DecodeError::SynthesisInit(_)
        ));
    }
}
