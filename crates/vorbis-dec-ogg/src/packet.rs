//! 逻辑流数据包.

use bytes::Bytes;

/// 从逻辑流中拼装出的一个完整数据包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggPacket {
    /// 数据包内容
    pub data: Bytes,
    /// 是否为逻辑流的第一个数据包
    pub bos: bool,
    /// 是否为逻辑流的最后一个数据包
    pub eos: bool,
    /// 粒度位置, 只有页面上最后一个完成的包携带, 其余为 -1
    pub granule_pos: i64,
    /// 包序号 (从 0 开始, 空洞也占用序号)
    pub packet_no: i64,
}

impl OggPacket {
    /// 从数据创建数据包, 其余字段为默认值
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            bos: false,
            eos: false,
            granule_pos: -1,
            packet_no: 0,
        }
    }
}
