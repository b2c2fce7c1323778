//! Tracing subscriber setup.
//!
//! Logging is off by default; set `KANDY_LOG` (an `EnvFilter` directive such
//! as `debug` or `kandy_eval=trace`) to enable it.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_env("KANDY_LOG")
        .unwrap_or_else(|_| EnvFilter::new("off"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
