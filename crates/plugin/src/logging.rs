//! tracing output routed to logcat
//!
//! Each formatted event becomes one `__android_log_write` call under the
//! `eglhud` tag. Hosts without liblog get the same lines on stderr.

use std::io::{self, Write};

use eglhud_core::CoreConfig;
use eglhud_engine::{DynamicLinker, LogApi};
use eglhud_sdk::{
    ANDROID_LOG_DEBUG, ANDROID_LOG_ERROR, ANDROID_LOG_INFO, ANDROID_LOG_VERBOSE, ANDROID_LOG_WARN,
};
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured filter
pub const LOG_ENV: &str = "EGLHUD_LOG";

/// Logcat tag
pub const LOG_TAG: &str = "eglhud";

/// Install the global subscriber. Later calls are no-ops.
pub fn init(config: &CoreConfig) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let sink = LogSink {
        logcat: LogApi::resolve(&DynamicLinker).ok(),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .with_writer(sink)
        .try_init();
}

fn priority(level: &Level) -> i32 {
    match *level {
        Level::ERROR => ANDROID_LOG_ERROR,
        Level::WARN => ANDROID_LOG_WARN,
        Level::INFO => ANDROID_LOG_INFO,
        Level::DEBUG => ANDROID_LOG_DEBUG,
        Level::TRACE => ANDROID_LOG_VERBOSE,
    }
}

/// Hands out one [`LogLine`] per event
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    logcat: Option<LogApi>,
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogLine;

    fn make_writer(&'a self) -> Self::Writer {
        LogLine::new(self.logcat, ANDROID_LOG_INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        LogLine::new(self.logcat, priority(meta.level()))
    }
}

/// Buffers one formatted event and emits it on drop
pub struct LogLine {
    logcat: Option<LogApi>,
    priority: i32,
    buf: Vec<u8>,
}

impl LogLine {
    fn new(logcat: Option<LogApi>, priority: i32) -> Self {
        Self {
            logcat,
            priority,
            buf: Vec::with_capacity(128),
        }
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.buf).trim_end().to_string()
    }
}

impl Write for LogLine {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LogLine {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        match self.logcat {
            Some(api) => api.write(self.priority, LOG_TAG, &self.text()),
            None => {
                let _ = io::stderr().write_all(&self.buf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_mapping() {
        assert_eq!(priority(&Level::ERROR), ANDROID_LOG_ERROR);
        assert_eq!(priority(&Level::WARN), ANDROID_LOG_WARN);
        assert_eq!(priority(&Level::INFO), ANDROID_LOG_INFO);
        assert_eq!(priority(&Level::DEBUG), ANDROID_LOG_DEBUG);
        assert_eq!(priority(&Level::TRACE), ANDROID_LOG_VERBOSE);
    }

    #[test]
    fn test_line_buffers_writes() {
        let mut line = LogLine::new(None, ANDROID_LOG_INFO);
        write!(line, "Present call ").unwrap();
        writeln!(line, "hooked").unwrap();
        assert_eq!(line.text(), "Present call hooked");
        line.buf.clear();
    }

    #[test]
    fn test_sink_default_priority() {
        let sink = LogSink { logcat: None };
        let line = sink.make_writer();
        assert_eq!(line.priority, ANDROID_LOG_INFO);
        assert!(line.buf.is_empty());
    }
}
