use slog::{o, Discard, Drain, Logger};

/// Root logger that drops every record
pub fn discard() -> Logger {
    Logger::root(Discard, o!())
}

/// Human readable logger writing to stderr
pub fn stderr_logger() -> Logger {
    let plain = slog_term::PlainSyncDecorator::new(std::io::stderr());
    Logger::root(slog_term::FullFormat::new(plain).build().fuse(), o!())
}
