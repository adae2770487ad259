//! # vorbis-dec-ogg
//!
//! 推模式 (push) Ogg 容器解析. 调用方把任意切分的字节写入 [`SyncState`],
//! 逐页取出 [`Page`], 再交给按序列号建立的 [`StreamState`] 拼装出
//! [`OggPacket`]. 不做 seek, 也不做多逻辑流复用.
//!
//! # Ogg 页面结构
//! ```text
//! Capture pattern: "OggS" (4 bytes)
//! Version:         1 byte (always 0)
//! Header type:     1 byte (flags: continued=0x01, BOS=0x02, EOS=0x04)
//! Granule pos:     8 bytes (little-endian, codec-specific)
//! Serial number:   4 bytes (identifies logical stream)
//! Page seq no:     4 bytes
//! CRC checksum:    4 bytes
//! Num segments:    1 byte
//! Segment table:   N bytes (each 1 byte, packet sizes)
//! Page data:       sum(segment_table) bytes
//! ```

pub mod packet;
pub mod page;
pub mod stream;
pub mod sync;
pub mod writer;

// 重导出常用类型
pub use packet::OggPacket;
pub use page::Page;
pub use stream::{PacketOut, StreamState};
pub use sync::{PageOut, SyncState};
pub use writer::PageWriter;
