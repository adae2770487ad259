//! 日志初始化模块.
//!
//! 双输出:
//! - console (stderr): 终端下彩色, 默认 warn, 可通过 -v/-vv 提升
//! - file: 无色, 带 target, 默认 info, 可通过 -v/-vv 或 VORBIS_DEC_LOG 环境变量调整
//!
//! 日志文件输出到 $cwd/logs/{prefix}.{date}.log

use anyhow::Context;
use chrono::{Datelike, Local, Timelike};
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const LOG_ENV: &str = "VORBIS_DEC_LOG";

/// 初始化日志系统
///
/// - `log_dir`: 日志目录
/// - `file_prefix`: 日志文件前缀
/// - `verbosity`: 0=info, 1=debug, 2+=trace (由 -v/-vv 控制)
pub fn init(log_dir: &str, file_prefix: &str, verbosity: u8) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir).with_context(|| format!("创建日志目录 {log_dir} 失败"))?;

    let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(file_prefix)
        .filename_suffix("log")
        .build(log_dir)
        .context("创建日志文件失败")?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD.set(guard).ok();

    // Console: 写 stderr, stdout 留给 `-o -` 的 PCM 输出
    let ansi = std::io::stderr().is_terminal();
    let console_filter = EnvFilter::new(console_level(verbosity));
    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .event_format(ConsoleFormatter { ansi })
        .with_filter(console_filter);

    // File: 默认 info, 通过 -v 提升, VORBIS_DEC_LOG 环境变量可覆盖
    let file_filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(file_level(verbosity)));

    let file_layer = fmt::Layer::default()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("日志系统已初始化")?;
    Ok(())
}

fn console_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn file_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// 写出 `[月-日 时:分:秒.毫秒] LEVEL > ` 前缀, `ansi` 为真时级别带颜色
fn write_prefix(writer: &mut Writer<'_>, level: tracing::Level, ansi: bool) -> std::fmt::Result {
    let now = Local::now();
    write!(
        writer,
        "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] ",
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.timestamp_subsec_millis(),
    )?;
    if !ansi {
        return write!(writer, "{level:5} > ");
    }
    let color = match level {
        tracing::Level::ERROR => "\x1b[31m",
        tracing::Level::WARN => "\x1b[33m",
        tracing::Level::INFO => "\x1b[32m",
        _ => "\x1b[34m",
    };
    write!(writer, "{color}{level:5}\x1b[0m > ")
}

/// stderr 格式: 终端下彩色, 重定向到文件或管道时无色
struct ConsoleFormatter {
    ansi: bool,
}

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        write_prefix(&mut writer, *event.metadata().level(), self.ansi)?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// 日志文件格式: 无色, 带事件来源模块, 便于区分 ogg/codec/session 层
struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        write_prefix(&mut writer, *meta.level(), false)?;
        write!(writer, "{}: ", meta.target())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_日志级别随_verbosity_提升() {
        assert_eq!(console_level(0), "warn");
        assert_eq!(console_level(3), "debug");
        assert_eq!(file_level(0), "info");
        assert_eq!(file_level(1), "debug");
        assert_eq!(file_level(2), "trace");
    }

    #[test]
    fn test_前缀格式() {
        let mut plain = String::new();
        write_prefix(&mut Writer::new(&mut plain), tracing::Level::WARN, false).unwrap();
        assert!(plain.starts_with('['));
        assert!(plain.ends_with("] WARN  > "), "{plain:?}");
        assert!(!plain.contains('\x1b'));

        let mut colored = String::new();
        write_prefix(&mut Writer::new(&mut colored), tracing::Level::ERROR, true).unwrap();
        assert!(colored.contains("\x1b[31mERROR\x1b[0m > "), "{colored:?}");
    }
}
