//! 浮点 PCM → 16 位有符号交织 PCM.
//!
//! 每个样本按 `floor(s * 32767 + 0.5)` 取整并钳位到 `[-32768, 32767]`,
//! 帧内按声道交织, 小端序输出.

use byteorder::{ByteOrder, LittleEndian};

use crate::synthesis::Pcm;

/// 一次转换中的钳位统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipReport {
    /// 超出 16 位范围被钳位的样本数
    pub clipped: usize,
}

impl ClipReport {
    /// 是否发生钳位
    pub fn any(&self) -> bool {
        self.clipped > 0
    }
}

/// 单个样本转换, 返回 (值, 是否钳位)
#[inline]
pub fn quantize(sample: f32) -> (i16, bool) {
    let v = (sample * 32767.0 + 0.5).floor();
    if v > 32767.0 {
        (i16::MAX, true)
    } else if v < -32768.0 {
        (i16::MIN, true)
    } else {
        (v as i16, false)
    }
}

/// 把 `pcm` 的前 `frames` 帧转换为交织样本写入 `out`.
///
/// `out` 至少要有 `frames * channels` 个元素.
pub fn convert_into(pcm: &Pcm<'_>, frames: usize, out: &mut [i16]) -> ClipReport {
    let channels = pcm.channels();
    let mut report = ClipReport::default();
    for ch in 0..channels {
        let src = &pcm.channel(ch)[..frames];
        for (j, &s) in src.iter().enumerate() {
            let (v, clipped) = quantize(s);
            if clipped {
                report.clipped += 1;
            }
            out[j * channels + ch] = v;
        }
    }
    report
}

/// 转换并追加到字节输出, `scratch` 为复用的样本缓冲
pub fn convert_to_bytes(
    pcm: &Pcm<'_>,
    frames: usize,
    scratch: &mut Vec<i16>,
    out: &mut Vec<u8>,
) -> ClipReport {
    let samples = frames * pcm.channels();
    scratch.clear();
    scratch.resize(samples, 0);
    let report = convert_into(pcm, frames, scratch);

    let start = out.len();
    out.resize(start + samples * 2, 0);
    LittleEndian::write_i16_into(scratch, &mut out[start..]);
    report
}
