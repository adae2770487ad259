//! # vorbis-dec-core
//!
//! vorbis-dec 各 crate 共用的基础设施: 统一错误类型与 Ogg 页面 CRC-32.

pub mod crc;
pub mod error;

// 重导出常用类型
pub use error::{DecodeError, DecodeResult};
