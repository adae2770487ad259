//! 解码会话.
//!
//! [`Session`] 持有一个活动逻辑流的全部状态. 生命周期:
//! 1. [`Session::setup`]: 清理旧状态, 协商三个头包, 成功后进入就绪状态
//! 2. [`Session::decode`]: 可多次调用, 每次返回本次输入可解出的 PCM
//! 3. 消费到 EOS 页面时自动清理, 再次解码前必须重新 setup

use log::{debug, info, warn};
use vorbis_dec_codec::convert::convert_to_bytes;
use vorbis_dec_codec::{
    CodecComment, CodecInfo, HeaderNegotiator, HeaderStage, SymphoniaSynthesizer, SynthesisBlock,
    SynthesisState, SynthesizerFactory,
};
use vorbis_dec_core::{DecodeError, DecodeResult};
use vorbis_dec_ogg::{PacketOut, Page, PageOut, StreamState, SyncState};

use crate::config::SessionConfig;
use crate::pump::{PacketPump, PumpEvent, WindowFeeder};
use crate::stats::DecodeStats;

/// setup 成功后的流参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupInfo {
    /// 已送入页面同步器的输入字节数.
    ///
    /// 其中属于音频页面的部分留在同步器中, 由下一次 decode 处理,
    /// 后续 decode 应从 `input[consumed..]` 继续.
    pub consumed: usize,
    pub channels: u8,
    pub sample_rate: u32,
}

/// 活动逻辑流的状态, 字段按释放顺序声明
struct ActiveStream {
    block: SynthesisBlock,
    synth: SynthesisState,
    stream: StreamState,
    comment: CodecComment,
    info: CodecInfo,
    sync: SyncState,
    /// 每次转换的最大帧数
    conv_frames: usize,
    scratch: Vec<i16>,
}

/// Ogg Vorbis 解码会话
pub struct Session {
    config: SessionConfig,
    factory: SynthesizerFactory,
    active: Option<ActiveStream>,
    stats: DecodeStats,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// 以默认配置与 symphonia 合成后端创建会话
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            factory: SymphoniaSynthesizer::create,
            active: None,
            stats: DecodeStats::default(),
        }
    }

    /// 以指定配置创建会话
    pub fn with_config(config: SessionConfig) -> DecodeResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// 替换合成后端
    pub fn with_synthesizer_factory(mut self, factory: SynthesizerFactory) -> Self {
        self.factory = factory;
        self
    }

    /// 会话配置
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 是否已完成头部协商
    pub fn is_ready(&self) -> bool {
        self.active.is_some()
    }

    /// 当前流参数, 未就绪时为 `None`
    pub fn info(&self) -> Option<&CodecInfo> {
        self.active.as_ref().map(|a| &a.info)
    }

    /// 自上次 setup 以来的累计统计
    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    /// 释放活动流, 回到未就绪状态
    pub fn reset(&mut self) {
        self.teardown();
    }

    /// 协商新逻辑流的头部.
    ///
    /// 先无条件清理已有状态; 任何失败都不会留下部分构造的状态.
    pub fn setup(&mut self, input: &[u8]) -> DecodeResult<SetupInfo> {
        self.teardown();
        self.stats = DecodeStats::default();

        let window = self.config.read_window;
        let mut sync = SyncState::new().with_crc_check(self.config.verify_crc);
        let mut feeder = WindowFeeder::new(input, window);
        let fed = feeder.feed_next(&mut sync);

        let first = self.first_page(&mut sync).ok_or_else(|| {
            if fed < window {
                DecodeError::InsufficientData
            } else {
                DecodeError::NotAContainer
            }
        })?;

        let mut stream = StreamState::new(first.serial_no());
        let mut negotiator = HeaderNegotiator::new();

        stream
            .page_in(&first)
            .map_err(|e| DecodeError::CorruptStream(e.to_string()))?;
        match stream.packet_out() {
            PacketOut::Packet(packet) => {
                negotiator.accept(&packet)?;
            }
            PacketOut::Hole => {
                return Err(DecodeError::CorruptStream("首页数据包残缺".into()));
            }
            PacketOut::None => {
                return Err(DecodeError::CorruptStream("首页不含完整数据包".into()));
            }
        }

        while negotiator.stage() != HeaderStage::Complete {
            match stream.packet_out() {
                PacketOut::Packet(packet) => {
                    negotiator.accept(&packet)?;
                    continue;
                }
                PacketOut::Hole => {
                    return Err(DecodeError::CorruptSecondaryHeader(format!(
                        "第 {} 个头包之前出现空洞",
                        negotiator.accepted(),
                    )));
                }
                PacketOut::None => {}
            }

            match sync.page_out() {
                PageOut::Page(page) => {
                    if page.serial_no() != stream.serial_no() {
                        self.stats.foreign_pages += 1;
                        continue;
                    }
                    stream
                        .page_in(&page)
                        .map_err(|e| DecodeError::CorruptSecondaryHeader(e.to_string()))?;
                }
                PageOut::Skipped(n) => {
                    self.stats.skip_events += 1;
                    self.stats.skipped_bytes += n as u64;
                    warn!("Ogg: 头部阶段失步, 跳过 {n} 字节");
                }
                PageOut::NeedMore => {
                    if feeder.feed_next(&mut sync) == 0 {
                        return Err(DecodeError::TruncatedHeaders);
                    }
                }
            }
        }

        let headers = negotiator.finish()?;
        let channels = headers.info.channels;
        let synth = SynthesisState::new(&headers.info, &headers.packets, self.factory)?;
        let conv_frames = self.config.conv_frames(channels as usize);

        info!(
            "Vorbis: 流 {} 就绪: {} 声道, {} Hz, vendor={:?}, 后端 {}",
            stream.serial_no(),
            channels,
            headers.info.sample_rate,
            headers.comment.vendor,
            synth.backend_name(),
        );

        let setup_info = SetupInfo {
            consumed: feeder.consumed(),
            channels,
            sample_rate: headers.info.sample_rate,
        };
        self.active = Some(ActiveStream {
            block: SynthesisBlock::new(channels as usize),
            synth,
            stream,
            comment: headers.comment,
            info: headers.info,
            sync,
            conv_frames,
            scratch: Vec::with_capacity(conv_frames * channels as usize),
        });
        Ok(setup_info)
    }

    /// 解码一段输入, 返回按产出顺序拼接的 16 位交织 PCM.
    ///
    /// 未就绪时返回 [`DecodeError::NotReady`] 且不改变任何状态.
    /// 消费到 EOS 页面后会话被清理.
    pub fn decode(&mut self, input: &[u8]) -> DecodeResult<Vec<u8>> {
        let active = self.active.as_mut().ok_or(DecodeError::NotReady)?;
        let stats = &mut self.stats;
        let mut out = Vec::new();

        let mut pump = PacketPump::new(
            &mut active.sync,
            &mut active.stream,
            input,
            self.config.read_window,
            stats,
        );
        let mut packets = 0u64;
        let mut holes = 0u64;
        let mut failures = 0u64;
        let mut blocks = 0u64;
        let mut frames = 0u64;
        let mut clipped = 0u64;

        for event in pump.by_ref() {
            let packet = match event {
                PumpEvent::Packet(packet) => packet,
                PumpEvent::Hole => {
                    holes += 1;
                    warn!("Vorbis: 数据包空洞, 已跳过");
                    continue;
                }
            };
            packets += 1;

            match active.synth.synthesize(&mut active.block, &packet) {
                Ok(()) => {
                    active.synth.block_in(&mut active.block);
                    blocks += 1;
                }
                Err(e) => {
                    failures += 1;
                    warn!("Vorbis: 包 #{} 合成失败, 已跳过: {e}", packet.packet_no);
                }
            }

            while let Some(pcm) = active.synth.pcm_out() {
                let n = pcm.frames().min(active.conv_frames);
                let report = convert_to_bytes(&pcm, n, &mut active.scratch, &mut out);
                if report.any() {
                    debug!("Vorbis: 包 #{} 钳位 {} 个样本", packet.packet_no, report.clipped);
                }
                clipped += report.clipped as u64;
                frames += n as u64;
                active.synth.read(n)?;
            }
        }
        let eos = pump.reached_eos();
        drop(pump);

        self.stats.packets += packets;
        self.stats.holes += holes;
        self.stats.synthesis_failures += failures;
        self.stats.blocks += blocks;
        self.stats.frames += frames;
        self.stats.clipped_samples += clipped;

        if eos {
            debug!("Vorbis: 到达流末, 共输出 {} 帧", self.stats.frames);
            self.teardown();
        }
        Ok(out)
    }

    /// 在首个窗口内取第一个页面, 跳过前导垃圾
    fn first_page(&mut self, sync: &mut SyncState) -> Option<Page> {
        loop {
            match sync.page_out() {
                PageOut::Page(page) => return Some(page),
                PageOut::Skipped(n) => {
                    self.stats.skip_events += 1;
                    self.stats.skipped_bytes += n as u64;
                }
                PageOut::NeedMore => return None,
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            debug!(
                "Vorbis: 释放流 {} ({} 声道, vendor={:?})",
                active.stream.serial_no(),
                active.info.channels,
                active.comment.vendor,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_未就绪时解码返回_not_ready() {
        let mut session = Session::new();
        assert!(matches!(session.decode(&[0u8; 16]), Err(DecodeError::NotReady)));
        assert!(!session.is_ready());
        assert_eq!(session.stats(), &DecodeStats::default());
    }

    #[test]
    fn test_空输入_insufficient_data() {
        let mut session = Session::new();
        assert!(matches!(session.setup(&[]), Err(DecodeError::InsufficientData)));
    }

    #[test]
    fn test_满窗口无页面_not_a_container() {
        let mut session = Session::new();
        let junk = vec![0x20u8; 5000];
        assert!(matches!(session.setup(&junk), Err(DecodeError::NotAContainer)));
        assert!(!session.is_ready());
    }

    #[test]
    fn test_非法配置被拒绝() {
        let config = SessionConfig {
            conv_buffer_samples: 0,
            ..Default::default()
        };
        assert!(matches!(
            Session::with_config(config),
            Err(DecodeError::InvalidConfig(_))
        ));
    }
}
