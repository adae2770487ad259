//! PCM 输出: 原始 s16le 或 RIFF/WAVE.
//!
//! WAV 头先以占位长度写出, [`PcmSink::finish`] 时回填 RIFF 与 data 块长度.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};
use byteorder::{LittleEndian, WriteBytesExt};

const WAV_HEADER_LEN: u64 = 44;

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// 无头部的 16 位小端交织 PCM
    Raw,
    /// RIFF/WAVE, PCM 16 位
    Wav,
}

impl OutputFormat {
    /// 按扩展名推断, `.wav` 为 WAV, 其余为原始 PCM
    pub fn from_path(path: &str) -> Self {
        let is_wav = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if is_wav { Self::Wav } else { Self::Raw }
    }
}

/// PCM 写出目标
pub struct PcmSink {
    format: OutputFormat,
    writer: Box<dyn SinkWriter>,
    data_len: u64,
}

/// 可选可回写的输出流
trait SinkWriter: Write {
    fn rewind_to(&mut self, pos: u64) -> io::Result<bool>;
}

impl<W: Write + Seek> SinkWriter for BufWriter<W> {
    fn rewind_to(&mut self, pos: u64) -> io::Result<bool> {
        self.seek(SeekFrom::Start(pos))?;
        Ok(true)
    }
}

struct StdoutWriter(io::Stdout);

impl Write for StdoutWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl SinkWriter for StdoutWriter {
    fn rewind_to(&mut self, _pos: u64) -> io::Result<bool> {
        Ok(false)
    }
}

impl PcmSink {
    /// 打开输出, `-` 表示标准输出 (始终为原始 PCM)
    pub fn create(path: &str, channels: u16, sample_rate: u32) -> Result<Self> {
        let (format, writer): (OutputFormat, Box<dyn SinkWriter>) = if path == "-" {
            (OutputFormat::Raw, Box::new(StdoutWriter(io::stdout())))
        } else {
            let file = File::create(path).with_context(|| format!("无法创建输出文件 {path}"))?;
            (OutputFormat::from_path(path), Box::new(BufWriter::new(file)))
        };

        let mut sink = Self {
            format,
            writer,
            data_len: 0,
        };
        if format == OutputFormat::Wav {
            sink.write_wav_header(channels, sample_rate, 0)?;
        }
        Ok(sink)
    }

    /// 输出格式
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// 追加 PCM 字节
    pub fn write_pcm(&mut self, pcm: &[u8]) -> Result<()> {
        self.writer.write_all(pcm).context("写出 PCM 失败")?;
        self.data_len += pcm.len() as u64;
        Ok(())
    }

    /// 已写出的 PCM 字节数
    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    /// 结束写出, WAV 回填长度字段
    pub fn finish(mut self, channels: u16, sample_rate: u32) -> Result<u64> {
        if self.format == OutputFormat::Wav {
            let data_len = u32::try_from(self.data_len).context("PCM 数据超过 WAV 4GiB 上限")?;
            if self.writer.rewind_to(0)? {
                self.write_wav_header(channels, sample_rate, data_len)?;
                self.writer.rewind_to(WAV_HEADER_LEN + self.data_len)?;
            }
        }
        self.writer.flush().context("刷新输出失败")?;
        Ok(self.data_len)
    }

    fn write_wav_header(&mut self, channels: u16, sample_rate: u32, data_len: u32) -> Result<()> {
        let block_align = channels * 2;
        let w = &mut self.writer;
        w.write_all(b"RIFF")?;
        w.write_u32::<LittleEndian>(36 + data_len)?;
        w.write_all(b"WAVE")?;
        w.write_all(b"fmt ")?;
        w.write_u32::<LittleEndian>(16)?;
        w.write_u16::<LittleEndian>(1)?;
        w.write_u16::<LittleEndian>(channels)?;
        w.write_u32::<LittleEndian>(sample_rate)?;
        w.write_u32::<LittleEndian>(sample_rate * u32::from(block_align))?;
        w.write_u16::<LittleEndian>(block_align)?;
        w.write_u16::<LittleEndian>(16)?;
        w.write_all(b"data")?;
        w.write_u32::<LittleEndian>(data_len)?;
        Ok(())
    }
}
