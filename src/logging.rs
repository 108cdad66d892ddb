//! Installs the process-wide logger for the binary.
//!
//! The library only talks to the `log` facade. Log lines go to stderr so that
//! stdout carries nothing but the row lines, the routine result, or the
//! failure line.

/// Install `env_logger` writing `LEVEL message time=<utc> target=<module>`
/// lines to stderr, filtered by `RUST_LOG` (default `warn`).
///
/// Later calls in the same process are no-ops.
pub fn log_to_stderr() {
    static ONCE: std::sync::Once = std::sync::Once::new();

    ONCE.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .format(|buf, record| {
                use std::io::Write;

                let now = time::OffsetDateTime::now_utc();

                writeln!(
                    buf,
                    "{} {} time={} target={}",
                    record.level(),
                    record.args(),
                    now,
                    record.target()
                )
            })
            .init();
    });
}
