//! # vorbis-dec-codec
//!
//! Vorbis 解码的编解码层:
//! - [`headers`]: 三个头包的解析与按序协商
//! - [`synthesis`]: 音频包 → 逐声道浮点样本的合成状态
//! - [`backend`]: 基于 symphonia 的合成后端
//! - [`convert`]: 浮点样本 → 16 位交织 PCM

pub mod backend;
pub mod convert;
pub mod headers;
pub mod synthesis;

pub use backend::SymphoniaSynthesizer;
pub use convert::ClipReport;
pub use headers::{
    CodecComment, CodecInfo, HeaderNegotiator, HeaderPackets, HeaderStage, NegotiatedHeaders,
};
pub use synthesis::{Pcm, SynthesisBlock, SynthesisState, Synthesizer, SynthesizerFactory};
