//! Process-wide tracing setup, mirroring the teacher's `env-tracing-logger`
//! crate: a compact, uptime-timed `fmt` layer plus an `EnvFilter` read from
//! `RUST_LOG`, installed once at startup rather than reached for ad hoc via
//! a module-level logger global.

use tracing_subscriber::{
    fmt::{self, format, time},
    prelude::*,
    EnvFilter,
};

struct Guard;

impl Drop for Guard {
    fn drop(&mut self) {}
}

/// Install the global tracing subscriber. `default_level` is used only if
/// `RUST_LOG` is unset. Returns a guard; dropping it is a no-op but keeping
/// it alive documents the intended lifetime at the call site.
pub fn init(default_level: &str) -> impl Drop {
    if std::env::var_os("RUST_LOG").is_none() {
        // SAFETY: called once at process start, before any other thread is spawned.
        unsafe { std::env::set_var("RUST_LOG", default_level) };
    }

    let evt_fmt = format().with_timer(time::Uptime::default()).compact();
    let fmt_layer = fmt::layer().event_format(evt_fmt);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::from_default_env())
        .init();

    Guard
}
