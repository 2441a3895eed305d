//! Agent logging
//!
//! Installs a `tracing` subscriber that renders events as
//! `YYYY-MM-DD HH:MM:SS LEVEL  message`. Level and colours come from an
//! explicit [`LogConfig`]; nothing here reads or sets global toggles.

use std::fmt;
use std::io::{self, IsTerminal};
use std::sync::Mutex;

use anyhow::Context;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const NO_COLOR: &str = "0";
const GRAY: &str = "1;30";
const GREEN: &str = "1;32";
const YELLOW: &str = "33";
const RED: &str = "31";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive, e.g. "info" or "kite_client=debug,info"
    pub level: String,

    /// Colour the prefix by level, and DEBUG messages gray
    pub colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            colors: colors_for_terminal(false),
        }
    }
}

/// Whether colour output makes sense on stderr
pub fn colors_for_terminal(no_color: bool) -> bool {
    !no_color && !cfg!(windows) && io::stderr().is_terminal()
}

/// Event formatter for agent output
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentFormat;

impl AgentFormat {
    /// ANSI colours for the timestamp-and-level prefix and for the message
    fn colors(level: &Level) -> (&'static str, &'static str) {
        match *level {
            Level::TRACE | Level::DEBUG => (GRAY, GRAY),
            Level::INFO => (GREEN, NO_COLOR),
            Level::WARN => (YELLOW, NO_COLOR),
            Level::ERROR => (RED, NO_COLOR),
        }
    }
}

impl<S, N> FormatEvent<S, N> for AgentFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();
        let name = format!("{:<6}", level.to_string());

        if writer.has_ansi_escapes() {
            let (prefix, message) = Self::colors(level);
            write!(writer, "\x1b[{}m{} {}\x1b[0m \x1b[{}m", prefix, now, name, message)?;
            ctx.field_format().format_fields(writer.by_ref(), event)?;
            return writeln!(writer, "\x1b[0m");
        }

        write!(writer, "{} {} ", now, name)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Builds a subscriber writing formatted events to `writer`
///
/// Wrap the writer in a `Mutex` to share it: each event is written under the
/// lock, so lines from concurrent tasks never interleave.
pub fn subscriber<W>(config: &LogConfig, writer: W) -> anyhow::Result<impl Subscriber + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    Ok(tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_ansi(config.colors)
            .with_writer(writer)
            .event_format(AgentFormat),
    ))
}

/// Installs the agent subscriber on stderr
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    subscriber(config, Mutex::new(io::stderr()))?
        .try_init()
        .context("Failed to install logger")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture(config: &LogConfig, f: impl FnOnce()) -> String {
        let buffer = Buffer::default();
        let subscriber = subscriber(config, Mutex::new(buffer.clone())).unwrap();
        tracing::subscriber::with_default(subscriber, f);
        buffer.contents()
    }

    fn plain(level: &str) -> LogConfig {
        LogConfig {
            level: level.to_string(),
            colors: false,
        }
    }

    #[test]
    fn test_line_layout() {
        let output = capture(&plain("info"), || tracing::info!("Acquired job abc"));

        let line = output.lines().next().unwrap();
        // "2024-05-01 10:00:00 " is 20 characters
        assert_eq!(line.as_bytes()[4], b'-');
        assert_eq!(line.as_bytes()[13], b':');
        assert_eq!(&line[20..], "INFO   Acquired job abc");
    }

    #[test]
    fn test_level_filter() {
        let output = capture(&plain("warn"), || {
            tracing::debug!("hidden");
            tracing::info!("hidden too");
            tracing::warn!("shown");
            tracing::error!("also shown");
        });

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" WARN   shown"));
        assert!(lines[1].ends_with(" ERROR  also shown"));
    }

    #[test]
    fn test_colors_wrap_prefix_and_debug_messages() {
        let config = LogConfig {
            level: "debug".to_string(),
            colors: true,
        };
        let output = capture(&config, || {
            tracing::debug!("quiet");
            tracing::error!("loud");
        });

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        // timestamp and level share the prefix colour
        assert!(lines[0].starts_with("\x1b[1;30m"));
        assert!(lines[0].ends_with(" DEBUG \x1b[0m \x1b[1;30mquiet\x1b[0m"));
        assert!(lines[1].starts_with("\x1b[31m"));
        assert!(lines[1].ends_with(" ERROR \x1b[0m \x1b[0mloud\x1b[0m"));
    }

    #[test]
    fn test_no_colors_means_no_escapes() {
        let output = capture(&plain("info"), || tracing::warn!("careful"));
        assert!(!output.contains('\x1b'));
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        assert!(subscriber(&plain("kite_client=loudest"), Mutex::new(Buffer::default())).is_err());
    }

    #[test]
    fn test_no_color_flag_disables_colors() {
        assert!(!colors_for_terminal(true));
    }
}
