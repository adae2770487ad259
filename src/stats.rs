//! 解码统计.
//!
//! 解码时被容忍跳过的数据 (失步字节, 空洞, 合成失败) 不作为错误返回,
//! 而是累计在这里供调用方检查.

use serde::Serialize;

/// 单个会话的累计计数, 每次 setup 时清零
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// 送入合成的音频包数
    pub packets: u64,
    /// 拼包空洞数 (页面丢失或续包残缺)
    pub holes: u64,
    /// 失步事件数
    pub skip_events: u64,
    /// 失步丢弃的字节数
    pub skipped_bytes: u64,
    /// 被忽略的其他逻辑流页面数
    pub foreign_pages: u64,
    /// 合成失败被跳过的包数
    pub synthesis_failures: u64,
    /// 并入合成队列的块数
    pub blocks: u64,
    /// 输出的样本帧数
    pub frames: u64,
    /// 钳位的样本数
    pub clipped_samples: u64,
}

impl DecodeStats {
    /// 是否有任何数据被跳过
    pub fn has_losses(&self) -> bool {
        self.holes > 0 || self.skip_events > 0 || self.synthesis_failures > 0
    }
}
