//! 解码会话配置.

use serde::{Deserialize, Serialize};
use vorbis_dec_core::{DecodeError, DecodeResult};

/// 默认输入窗口 (字节)
pub const DEFAULT_READ_WINDOW: usize = 4096;

/// 默认转换缓冲容量 (交织样本数, 按声道数均分为帧)
pub const DEFAULT_CONV_BUFFER_SAMPLES: usize = 4096;

/// 会话配置
///
/// 可从 JSON 加载, 缺失字段取默认值:
/// ```json
/// { "read_window": 8192, "verify_crc": false }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 每次送入页面同步器的最大字节数
    pub read_window: usize,
    /// 单次转换的最大交织样本数
    pub conv_buffer_samples: usize,
    /// 是否校验页面 CRC
    pub verify_crc: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_window: DEFAULT_READ_WINDOW,
            conv_buffer_samples: DEFAULT_CONV_BUFFER_SAMPLES,
            verify_crc: true,
        }
    }
}

impl SessionConfig {
    /// 校验参数范围
    pub fn validate(&self) -> DecodeResult<()> {
        if self.read_window == 0 {
            return Err(DecodeError::InvalidConfig("read_window 不能为 0".into()));
        }
        if self.conv_buffer_samples == 0 {
            return Err(DecodeError::InvalidConfig(
                "conv_buffer_samples 不能为 0".into(),
            ));
        }
        Ok(())
    }

    /// 指定声道数下每次转换的帧数, 至少为 1
    pub fn conv_frames(&self, channels: usize) -> usize {
        (self.conv_buffer_samples / channels.max(1)).max(1)
    }
}
