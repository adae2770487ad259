//! vorbis-dec-cli - Ogg Vorbis 解码命令行工具
//!
//! 把 Ogg Vorbis 文件解码为 16 位小端交织 PCM, 输出原始 PCM 或 WAV.

mod logging;
mod output;

use std::path::Path;
use std::process;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info};
use vorbis_dec::{Session, SessionConfig};

use output::PcmSink;

#[derive(Parser, Debug)]
#[command(name = "vorbis-dec-cli", version, about = "Ogg Vorbis → PCM/WAV 解码工具")]
struct Cli {
    /// 输入 Ogg Vorbis 文件
    #[arg(short, long)]
    input: String,

    /// 输出文件 (.wav 输出 WAV, 其余输出原始 s16le PCM, "-" 为标准输出)
    #[arg(short, long)]
    output: String,

    /// 每次 decode 送入的字节数
    #[arg(long, default_value_t = 64 * 1024)]
    chunk: usize,

    /// JSON 会话配置文件
    #[arg(long)]
    config: Option<String>,

    /// 覆盖配置中的输入窗口大小
    #[arg(long = "read-window")]
    read_window: Option<usize>,

    /// 关闭页面 CRC 校验
    #[arg(long = "no-crc")]
    no_crc: bool,

    /// 日志目录
    #[arg(long = "log-dir", default_value = "logs")]
    log_dir: String,

    /// 日志级别 (-v info/debug, -vv debug/trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init(&cli.log_dir, "vorbis-dec-cli", cli.verbose) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }

    if let Err(e) = run(&cli) {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("无法读取配置文件 {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("配置文件格式错误 {path}"))?
        }
        None => SessionConfig::default(),
    };
    if let Some(window) = cli.read_window {
        config.read_window = window;
    }
    if cli.no_crc {
        config.verify_crc = false;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> Result<()> {
    if cli.chunk == 0 {
        bail!("--chunk 不能为 0");
    }
    let config = load_config(cli)?;
    debug!("会话配置: {config:?}");

    let data = std::fs::read(&cli.input).with_context(|| format!("无法读取输入文件 {}", cli.input))?;
    let started = Instant::now();

    let mut session = Session::with_config(config)?;
    let setup = session
        .setup(&data)
        .with_context(|| format!("{} 头部协商失败", cli.input))?;
    info!(
        "{}: {} 声道, {} Hz",
        cli.input, setup.channels, setup.sample_rate
    );

    let channels = u16::from(setup.channels);
    let mut sink = PcmSink::create(&cli.output, channels, setup.sample_rate)?;

    for chunk in data[setup.consumed..].chunks(cli.chunk) {
        let pcm = session.decode(chunk)?;
        sink.write_pcm(&pcm)?;
        if !session.is_ready() {
            break;
        }
    }
    // setup 已读完全部输入时, 音频页面仍缓冲在同步器中
    if session.is_ready() {
        let pcm = session.decode(&[])?;
        sink.write_pcm(&pcm)?;
    }

    let format = sink.format();
    let bytes = sink.finish(channels, setup.sample_rate)?;
    let stats = session.stats();
    let frames = bytes / (u64::from(channels) * 2);
    let elapsed = started.elapsed().as_secs_f64();
    let duration = frames as f64 / f64::from(setup.sample_rate);

    eprintln!(
        "{} -> {} ({:?})",
        display_name(&cli.input),
        display_name(&cli.output),
        format
    );
    eprintln!(
        "  {} 声道, {} Hz, {} 帧 ({:.2} 秒), 耗时 {:.3} 秒",
        setup.channels, setup.sample_rate, frames, duration, elapsed
    );
    eprintln!(
        "  数据包 {}, 钳位样本 {}, 空洞 {}, 合成失败 {}, 失步 {} 次 ({} 字节)",
        stats.packets,
        stats.clipped_samples,
        stats.holes,
        stats.synthesis_failures,
        stats.skip_events,
        stats.skipped_bytes,
    );
    if session.is_ready() {
        eprintln!("  注意: 输入结束时未遇到 EOS 页面");
    }
    Ok(())
}

fn display_name(path: &str) -> &str {
    if path == "-" {
        return "<stdout>";
    }
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}
