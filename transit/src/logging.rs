//! Logger setup shared by the command line tools.

use std::io::Write;

/// Initialise `env_logger` at `info` (overridable with `RUST_LOG`) using the
/// `<timestamp> [<LEVEL>] <message>` line format.
///
/// Calling it more than once is harmless.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.args()
            )
        })
        .try_init();
}
