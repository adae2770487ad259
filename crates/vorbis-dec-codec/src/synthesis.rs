//! 合成状态: 音频包 → 逐声道浮点 PCM.
//!
//! 变换与窗口叠加由可替换的 [`Synthesizer`] 后端完成, 本模块负责
//! 块缓冲与已合成样本的排队. 流程:
//! 1. [`SynthesisState::synthesize`] 把音频包合成进 [`SynthesisBlock`]
//! 2. [`SynthesisState::block_in`] 把块内样本并入待输出队列
//! 3. 反复 [`SynthesisState::pcm_out`] + [`SynthesisState::read`] 直到队列为空

use log::debug;
use vorbis_dec_core::{DecodeError, DecodeResult};
use vorbis_dec_ogg::OggPacket;

use crate::headers::{CodecInfo, HeaderPackets};

/// 合成后端 trait
///
/// 每次调用把一个音频包合成为可直接输出的逐声道样本 (已完成叠加),
/// 写入 `block`. 合成失败的包被调用方跳过.
pub trait Synthesizer: Send {
    /// 后端名称
    fn name(&self) -> &str;

    /// 合成一个音频包
    fn synthesize(&mut self, packet: &OggPacket, block: &mut SynthesisBlock) -> DecodeResult<()>;
}

/// 合成后端工厂, 用协商得到的参数与原始头包构造后端.
///
/// 头包内容被后端拒绝时返回 [`DecodeError::CorruptSecondaryHeader`],
/// 其余构造失败返回 [`DecodeError::SynthesisInit`].
pub type SynthesizerFactory = fn(&CodecInfo, &HeaderPackets) -> DecodeResult<Box<dyn Synthesizer>>;

/// 单个音频包的合成暂存块
#[derive(Debug, Default)]
pub struct SynthesisBlock {
    planes: Vec<Vec<f32>>,
    frames: usize,
    granule_pos: i64,
    eos: bool,
}

impl SynthesisBlock {
    /// 按声道数创建暂存块
    pub fn new(channels: usize) -> Self {
        Self {
            planes: vec![Vec::new(); channels],
            frames: 0,
            granule_pos: -1,
            eos: false,
        }
    }

    /// 声道数
    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// 块内样本帧数
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// 单声道样本
    pub fn channel(&self, ch: usize) -> &[f32] {
        &self.planes[ch][..self.frames]
    }

    /// 准备写入 `frames` 帧, 返回各声道可写切片
    pub fn prepare(&mut self, frames: usize) -> Vec<&mut [f32]> {
        self.frames = frames;
        self.planes
            .iter_mut()
            .map(|plane| {
                plane.clear();
                plane.resize(frames, 0.0);
                plane.as_mut_slice()
            })
            .collect()
    }

    fn clear(&mut self) {
        self.frames = 0;
        self.granule_pos = -1;
        self.eos = false;
    }
}

/// 待输出的逐声道样本视图
#[derive(Debug, Clone, Copy)]
pub struct Pcm<'a> {
    planes: &'a [Vec<f32>],
    offset: usize,
    frames: usize,
}

impl<'a> Pcm<'a> {
    /// 从逐声道缓冲构造视图, 覆盖 `[offset, offset + frames)`
    pub fn new(planes: &'a [Vec<f32>], offset: usize, frames: usize) -> Self {
        Self {
            planes,
            offset,
            frames,
        }
    }

    /// 声道数
    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// 可用样本帧数
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// 单声道样本
    pub fn channel(&self, ch: usize) -> &'a [f32] {
        &self.planes[ch][self.offset..self.offset + self.frames]
    }
}

/// 单个活动逻辑流的合成状态
pub struct SynthesisState {
    backend: Box<dyn Synthesizer>,
    /// 已合成未读取的样本, `[read_pos..]` 有效
    pending: Vec<Vec<f32>>,
    read_pos: usize,
    /// 已并入队列的样本总帧数 (裁剪后)
    total_frames: i64,
}

impl SynthesisState {
    /// 用协商结果初始化合成状态
    pub fn new(
        info: &CodecInfo,
        packets: &HeaderPackets,
        factory: SynthesizerFactory,
    ) -> DecodeResult<Self> {
        let backend = factory(info, packets).map_err(|e| match e {
            DecodeError::SynthesisInit(_) | DecodeError::CorruptSecondaryHeader(_) => e,
            other => DecodeError::SynthesisInit(other.to_string()),
        })?;
        debug!(
            "Vorbis: 合成后端 {} 初始化完成 ({} 声道)",
            backend.name(),
            info.channels
        );
        Ok(Self {
            backend,
            pending: vec![Vec::new(); info.channels as usize],
            read_pos: 0,
            total_frames: 0,
        })
    }

    /// 合成后端名称
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// 声道数
    pub fn channels(&self) -> usize {
        self.pending.len()
    }

    /// 把音频包合成进暂存块
    pub fn synthesize(&mut self, block: &mut SynthesisBlock, packet: &OggPacket) -> DecodeResult<()> {
        block.clear();
        self.backend.synthesize(packet, block)?;
        if block.channels() != self.channels() {
            return Err(DecodeError::InvalidData(format!(
                "合成结果声道数不符: 期望 {}, 实际 {}",
                self.channels(),
                block.channels(),
            )));
        }
        block.granule_pos = packet.granule_pos;
        block.eos = packet.eos;
        Ok(())
    }

    /// 把暂存块并入待输出队列.
    ///
    /// 流末包的粒度位置小于累计帧数时, 丢弃多出的尾部样本.
    pub fn block_in(&mut self, block: &mut SynthesisBlock) {
        if self.read_pos > 0 {
            for plane in &mut self.pending {
                plane.drain(..self.read_pos);
            }
            self.read_pos = 0;
        }

        let frames = block.frames();
        for (ch, plane) in self.pending.iter_mut().enumerate() {
            plane.extend_from_slice(block.channel(ch));
        }
        self.total_frames += frames as i64;

        if block.eos && block.granule_pos >= 0 && block.granule_pos < self.total_frames {
            let excess = (self.total_frames - block.granule_pos) as usize;
            let trim = excess.min(self.available());
            let keep = self.pending.first().map_or(0, |p| p.len()) - trim;
            for plane in &mut self.pending {
                plane.truncate(keep);
            }
            self.total_frames -= trim as i64;
            debug!("Vorbis: 流末按粒度 {} 裁剪 {} 帧", block.granule_pos, trim);
        }

        block.clear();
    }

    /// 待读取的样本帧数
    pub fn available(&self) -> usize {
        self.pending
            .first()
            .map_or(0, |p| p.len().saturating_sub(self.read_pos))
    }

    /// 取得全部待读取样本, 没有时返回 `None`
    pub fn pcm_out(&self) -> Option<Pcm<'_>> {
        let frames = self.available();
        if frames == 0 {
            return None;
        }
        Some(Pcm::new(&self.pending, self.read_pos, frames))
    }

    /// 告知已消费 `frames` 帧
    pub fn read(&mut self, frames: usize) -> DecodeResult<()> {
        if frames > self.available() {
            return Err(DecodeError::InvalidData(format!(
                "读取帧数超出可用样本: 读取 {}, 可用 {}",
                frames,
                self.available(),
            )));
        }
        self.read_pos += frames;
        Ok(())
    }

    /// 已输出的样本总帧数
    pub fn total_frames(&self) -> i64 {
        self.total_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    /// 每个包输出 `frames` 帧, 样本值为包首字节 / 100
    struct RampSynthesizer {
        frames: usize,
    }

    impl Synthesizer for RampSynthesizer {
        fn name(&self) -> &str {
            "ramp"
        }

        fn synthesize(&mut self, packet: &OggPacket, block: &mut SynthesisBlock) -> DecodeResult<()> {
            let first = *packet
                .data
                .first()
                .ok_or_else(|| DecodeError::InvalidData("空包".into()))?;
            for plane in block.prepare(self.frames) {
                plane.fill(f32::from(first) / 100.0);
            }
            Ok(())
        }
    }

    fn ramp_factory(_: &CodecInfo, _: &HeaderPackets) -> DecodeResult<Box<dyn Synthesizer>> {
        Ok(Box::new(RampSynthesizer { frames: 64 }))
    }

    fn failing_factory(_: &CodecInfo, _: &HeaderPackets) -> DecodeResult<Box<dyn Synthesizer>> {
        Err(DecodeError::InvalidData("setup 码本损坏".into()))
    }

    fn rejecting_factory(_: &CodecInfo, _: &HeaderPackets) -> DecodeResult<Box<dyn Synthesizer>> {
        Err(DecodeError::CorruptSecondaryHeader("codebook 同步字错误".into()))
    }

    fn info(channels: u8) -> CodecInfo {
        CodecInfo {
            version: 0,
            channels,
            sample_rate: 48000,
            bitrate_upper: 0,
            bitrate_nominal: 0,
            bitrate_lower: 0,
            blocksize_short: 256,
            blocksize_long: 2048,
        }
    }

    fn headers() -> HeaderPackets {
        HeaderPackets {
            identification: Bytes::from_static(b"\x01vorbis"),
            setup: Bytes::from_static(b"\x05vorbis"),
        }
    }

    #[test]
    fn test_合成_排队_读取() {
        let mut state = SynthesisState::new(&info(2), &headers(), ramp_factory).unwrap();
        let mut block = SynthesisBlock::new(2);
        assert!(state.pcm_out().is_none());

        state
            .synthesize(&mut block, &OggPacket::from_data(vec![50u8]))
            .unwrap();
        state.block_in(&mut block);
        assert_eq!(block.frames(), 0);

        let pcm = state.pcm_out().unwrap();
        assert_eq!(pcm.frames(), 64);
        assert_eq!(pcm.channels(), 2);
        assert!((pcm.channel(1)[0] - 0.5).abs() < 1e-6);

        state.read(40).unwrap();
        assert_eq!(state.available(), 24);
        assert!(state.read(25).is_err());
        state.read(24).unwrap();
        assert!(state.pcm_out().is_none());
    }

    #[test]
    fn test_流末按粒度裁剪() {
        let mut state = SynthesisState::new(&info(1), &headers(), ramp_factory).unwrap();
        let mut block = SynthesisBlock::new(1);

        state
            .synthesize(&mut block, &OggPacket::from_data(vec![1u8]))
            .unwrap();
        state.block_in(&mut block);

        let last = OggPacket {
            eos: true,
            granule_pos: 100,
            ..OggPacket::from_data(vec![2u8])
        };
        state.synthesize(&mut block, &last).unwrap();
        state.block_in(&mut block);

        assert_eq!(state.available(), 100);
        assert_eq!(state.total_frames(), 100);
    }

    #[test]
    fn test_合成失败不改变队列() {
        let mut state = SynthesisState::new(&info(1), &headers(), ramp_factory).unwrap();
        let mut block = SynthesisBlock::new(1);
        assert!(
            state
                .synthesize(&mut block, &OggPacket::from_data(Vec::<u8>::new()))
                .is_err()
        );
        assert_eq!(state.available(), 0);
    }

    #[test]
    fn test_后端初始化失败映射为_synthesis_init() {
        let result = SynthesisState::new(&info(2), &headers(), failing_factory);
        assert!(matches!(result, Err(DecodeError::SynthesisInit(msg)) if msg.contains("码本")));
    }

    #[test]
    fn test_后端拒绝头包保留次级头损坏() {
        let result = SynthesisState::new(&info(2), &headers(), rejecting_factory);
        assert!(matches!(result, Err(DecodeError::CorruptSecondaryHeader(_))));
    }
}
