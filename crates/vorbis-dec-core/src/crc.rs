//! Ogg 页面 CRC-32 计算.
//!
//! 多项式 0x04C11DB7, 初始值 0, 不反射输入输出, 不做最终异或.
//! 校验范围为整个页面, 其中 CRC 字段本身按 0 参与计算.

/// Ogg CRC-32 查找表
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0u32;
    while i < 256 {
        let mut crc = i << 24;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000_0000 != 0 {
                crc = (crc << 1) ^ 0x04C1_1DB7;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
};

/// 在已有 CRC 值上继续累加数据
pub fn crc32_update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        let idx = ((crc >> 24) ^ u32::from(byte)) & 0xFF;
        crc = (crc << 8) ^ CRC32_TABLE[idx as usize];
    }
    crc
}

/// 计算 Ogg CRC-32
pub fn crc32(data: &[u8]) -> u32 {
    crc32_update(0, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_empty_data() {
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn test_crc32_known_value() {
        // CRC-32/CKSUM 的校验值 0x765E7680 去掉最终异或即为 Ogg 变体
        assert_eq!(crc32(b"123456789"), 0x89A1_897F);
    }

    #[test]
    fn test_crc32_分段累加与整体一致() {
        let data = b"OggS\x00\x02 incremental";
        let whole = crc32(data);
        let split = crc32_update(crc32(&data[..5]), &data[5..]);
        assert_eq!(whole, split);
    }
}
