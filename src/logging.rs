//! Log setup for the CLI and for the Python extension.
//!
//! The level comes from `LIGHTSENSOR_LOG`, falling back to `RUST_LOG`, and
//! defaults to `info`.

use std::sync::Once;

use log::LevelFilter;

static RUST_LOG_ONCE: Once = Once::new();

const LEVEL_VARS: [&str; 2] = ["LIGHTSENSOR_LOG", "RUST_LOG"];

fn level_from(value: Option<&str>) -> Option<LevelFilter> {
    value.and_then(|v| v.trim().parse::<LevelFilter>().ok())
}

/// First parseable value in `values` (in `LEVEL_VARS` order), else `info`.
fn first_level<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> LevelFilter {
    values
        .into_iter()
        .find_map(level_from)
        .unwrap_or(LevelFilter::Info)
}

fn env_level() -> LevelFilter {
    let values: Vec<Option<String>> = LEVEL_VARS.iter().map(|var| std::env::var(var).ok()).collect();
    first_level(values.iter().map(|v| v.as_deref()))
}

/// Apply `-v` flags on top of the environment level.
fn with_verbosity(base: LevelFilter, verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => base,
        1 => base.max(LevelFilter::Debug),
        _ => LevelFilter::Trace,
    }
}

/// Initialize stderr logging for the `lightsensor` binary.
///
/// `verbosity` raises the level above the environment default (`-v` = debug,
/// `-vv` = trace). Later calls are no-ops.
pub fn init_rust_logging(verbosity: u8) {
    let level = with_verbosity(env_level(), verbosity);
    RUST_LOG_ONCE.call_once(|| {
        env_logger::Builder::new()
            .filter_level(level)
            .format_timestamp_millis()
            .format_module_path(false)
            .format_target(true)
            .init();
    });
}

#[cfg(feature = "python")]
pub use python::{init_python_logging, set_python_log_level};

#[cfg(feature = "python")]
mod python {
    use std::sync::Once;

    use log::{Log, Metadata, Record};
    use once_cell::sync::OnceCell;
    use pyo3::prelude::*;
    use pyo3::types::PyModule;

    use super::{env_level, level_from};

    static PY_LOG_ONCE: Once = Once::new();
    static BRIDGE: OnceCell<&'static PyLogBridge> = OnceCell::new();

    /// Forwards `log` records to `logging.getLogger(<target>)`.
    struct PyLogBridge {
        logging: Py<PyModule>,
    }

    fn python_level(level: log::Level) -> u32 {
        match level {
            log::Level::Error => 40,
            log::Level::Warn => 30,
            log::Level::Info => 20,
            log::Level::Debug => 10,
            log::Level::Trace => 5,
        }
    }

    impl Log for PyLogBridge {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record) {
            if !self.enabled(record.metadata()) {
                return;
            }
            let target = record.target().replace("::", ".");
            let message = record.args().to_string();
            let level = python_level(record.level());
            Python::attach(|py| {
                let result = self
                    .logging
                    .bind(py)
                    .call_method1("getLogger", (target,))
                    .and_then(|logger| logger.call_method1("log", (level, message)));
                if let Err(e) = result {
                    e.restore(py);
                }
            });
        }

        fn flush(&self) {}
    }

    /// Route Rust log records into Python's `logging`. Safe to call repeatedly.
    pub fn init_python_logging(py: Python<'_>) -> PyResult<()> {
        let logging: Py<PyModule> = py.import("logging")?.into();
        let level = env_level();
        PY_LOG_ONCE.call_once(|| {
            let bridge: &'static PyLogBridge = Box::leak(Box::new(PyLogBridge { logging }));
            if log::set_logger(bridge).is_ok() {
                log::set_max_level(level);
                let _ = BRIDGE.set(bridge);
            }
        });
        Ok(())
    }

    /// Change the minimum forwarded level ("debug", "info", ...).
    /// `None` or an unparseable value falls back to the environment.
    pub fn set_python_log_level(py: Python<'_>, level: Option<&str>) -> PyResult<()> {
        init_python_logging(py)?;
        let level = level_from(level).unwrap_or_else(env_level);
        if BRIDGE.get().is_some() {
            log::set_max_level(level);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!(level_from(Some("debug")), Some(LevelFilter::Debug));
        assert_eq!(level_from(Some(" WARN ")), Some(LevelFilter::Warn));
        assert_eq!(level_from(Some("loud")), None);
        assert_eq!(level_from(None), None);
    }

    #[test]
    fn lightsensor_log_takes_precedence_over_rust_log() {
        assert_eq!(first_level([Some("debug"), Some("warn")]), LevelFilter::Debug);
        assert_eq!(first_level([None, Some("warn")]), LevelFilter::Warn);
        assert_eq!(first_level([Some("loud"), Some("error")]), LevelFilter::Error);
        assert_eq!(first_level([None, None]), LevelFilter::Info);
    }

    #[test]
    fn verbosity_raises_environment_level() {
        assert_eq!(with_verbosity(LevelFilter::Warn, 0), LevelFilter::Warn);
        assert_eq!(with_verbosity(LevelFilter::Warn, 1), LevelFilter::Debug);
        assert_eq!(with_verbosity(LevelFilter::Trace, 1), LevelFilter::Trace);
        assert_eq!(with_verbosity(LevelFilter::Off, 2), LevelFilter::Trace);
    }
}
