//! # vorbis-dec
//!
//! 增量式 Ogg Vorbis 解码器: 把任意切分的码流字节转换为 16 位小端交织 PCM.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use vorbis_dec::Session;
//!
//! # fn main() -> vorbis_dec::DecodeResult<()> {
//! let data = std::fs::read("input.ogg")?;
//! let mut session = Session::new();
//! let setup = session.setup(&data)?;
//! println!("{} 声道, {} Hz", setup.channels, setup.sample_rate);
//!
//! let mut pcm = Vec::new();
//! for chunk in data[setup.consumed..].chunks(16 * 1024) {
//!     pcm.extend(session.decode(chunk)?);
//!     if !session.is_ready() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `vorbis-dec-core` | 统一错误类型与 Ogg CRC |
//! | `vorbis-dec-ogg` | 推模式页面同步与拼包 |
//! | `vorbis-dec-codec` | 头部协商, 合成与 PCM 转换 |

pub mod config;
pub mod pump;
pub mod session;
pub mod stats;

/// 核心类型与错误
pub use vorbis_dec_core as core;

/// Ogg 容器解析
pub use vorbis_dec_ogg as ogg;

/// Vorbis 编解码层
pub use vorbis_dec_codec as codec;

pub use config::SessionConfig;
pub use pump::{PacketPump, PumpEvent};
pub use session::{Session, SetupInfo};
pub use stats::DecodeStats;
pub use vorbis_dec_core::{DecodeError, DecodeResult};

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
