//! 统一错误类型定义.
//!
//! 会话层 (setup/decode) 直接向调用方返回这些错误; 容器层与编解码层
//! 使用其中的结构性变体, 由会话层按所处阶段映射为对外语义.

use thiserror::Error;

/// vorbis-dec 统一错误类型
#[derive(Debug, Error)]
pub enum DecodeError {
    /// 输入字节不足以找到第一个 Ogg 页面
    #[error("数据不足, 无法找到 Ogg 头页面")]
    InsufficientData,

    /// 输入足够但首个页面无法提取, 不是 Ogg 码流
    #[error("输入看起来不是 Ogg 码流")]
    NotAContainer,

    /// 首个数据包不是 Vorbis identification 头
    #[error("该 Ogg 码流不包含 Vorbis 音频: {0}")]
    NotCodecAudio(String),

    /// 首个页面或首个头包结构损坏
    #[error("Ogg 码流损坏: {0}")]
    CorruptStream(String),

    /// 第二或第三个头包 (comment/setup) 损坏
    #[error("Vorbis 次级头包损坏: {0}")]
    CorruptSecondaryHeader(String),

    /// 输入在三个头包全部到达前耗尽
    #[error("找到全部 Vorbis 头包之前输入已结束")]
    TruncatedHeaders,

    /// 在 setup 成功之前调用 decode
    #[error("头包尚未就绪, 无法解码")]
    NotReady,

    /// 合成状态初始化失败 (头包已接受但后端拒绝)
    #[error("合成状态初始化失败: {0}")]
    SynthesisInit(String),

    /// 页面/数据包层面的无效数据
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 会话配置非法
    #[error("无效配置: {0}")]
    InvalidConfig(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// vorbis-dec 统一 Result 类型
pub type DecodeResult<T> = Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_错误信息包含上下文() {
        let err = DecodeError::CorruptSecondaryHeader("comment 头包标识无效".into());
        assert!(err.to_string().contains("comment 头包标识无效"));
    }

    #[test]
    fn test_io_错误自动转换() {
        fn open() -> DecodeResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))?;
            Ok(())
        }
        assert!(matches!(open(), Err(DecodeError::Io(_))));
    }
}
