//! Light-sensor acquisition with gain normalization and error propagation.
//!
//! An Arduino reads a TSL2591-style sensor and prints one line per reading:
//! full-spectrum and infrared counts, its uptime in milliseconds and the gain
//! register value. This crate decodes those lines, divides out the gain
//! multiplier, optionally subtracts a measured background and reports
//! per-channel means with an uncertainty combining sample fluctuation and
//! integer quantization in quadrature.
//!
//! # Measuring
//!
//! 1. Open the port with [`SerialConnection::open`] and wrap it in a
//!    [`LightSensor`].
//! 2. With the light source off, call [`LightSensor::set_background`].
//! 3. With it on, call [`LightSensor::collect_data`].
//!
//! Each acquisition replaces the previous run's samples; use
//! [`LightSensor::recent`] or [`LightSensor::take_samples`] to keep them.

mod acquisition;
mod background;
mod buffer;
mod connection;
mod errors;
mod frame;
mod gain;
pub mod logging;
mod sensor;
pub mod stats;

pub use acquisition::{acquire, AcquisitionReport, StopReason};
pub use background::{BackgroundState, BackgroundTracker};
pub use buffer::{SampleBuffer, SampleSnapshot};
pub use connection::{
    list_ports, LineSource, SerialConnection, SerialSettings, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT,
};
pub use errors::*;
pub use frame::{decode_bytes, decode_line, RawReading, Sample};
pub use gain::{multiplier_table, Gain};
pub use sensor::{LightSensor, Measurement};
pub use stats::{Channels, Summary};

// ============================================================================
// Python Bindings
// ============================================================================

#[cfg(feature = "python")]
mod python {
    use std::time::Duration;

    use pyo3::exceptions::{PyConnectionError, PyRuntimeError, PyValueError};
    use pyo3::prelude::*;
    use pyo3::types::PyDict;

    use super::*;

    type Triple = (f64, f64, f64);
    type Sextuple = (f64, f64, f64, f64, f64, f64);

    fn to_py_err(e: SensorError) -> PyErr {
        match e {
            SensorError::ConnectionLost(_) | SensorError::Serial(_) => {
                PyConnectionError::new_err(e.to_string())
            }
            SensorError::EmptyBuffer { .. }
            | SensorError::MalformedFrame(_)
            | SensorError::UnknownGain(_) => PyValueError::new_err(e.to_string()),
            SensorError::Unexpected(_) => PyRuntimeError::new_err(e.to_string()),
        }
    }

    fn triple(c: Channels<f64>) -> Triple {
        (c.full, c.ir, c.visible)
    }

    fn sextuple(s: Summary) -> Sextuple {
        (
            s.mean.full,
            s.mean.ir,
            s.mean.visible,
            s.error.full,
            s.error.ir,
            s.error.visible,
        )
    }

    fn seconds(duration: f64) -> PyResult<Duration> {
        Duration::try_from_secs_f64(duration)
            .map_err(|e| PyValueError::new_err(format!("invalid duration {duration}: {e}")))
    }

    /// Result of an acquisition run.
    ///
    /// Attributes:
    ///     samples: Number of frames stored.
    ///     dropped: Number of malformed frames skipped.
    ///     timeouts: Number of reads that timed out with no data.
    ///     elapsed: Seconds the run took.
    ///     failure: Why the run ended early, or None if it ran to the deadline.
    #[pyclass(name = "AcquisitionReport", frozen)]
    #[derive(Clone)]
    struct PyAcquisitionReport {
        #[pyo3(get)]
        samples: usize,
        #[pyo3(get)]
        dropped: usize,
        #[pyo3(get)]
        timeouts: usize,
        #[pyo3(get)]
        elapsed: f64,
        #[pyo3(get)]
        failure: Option<String>,
    }

    #[pymethods]
    impl PyAcquisitionReport {
        fn __repr__(&self) -> String {
            format!(
                "AcquisitionReport(samples={}, dropped={}, timeouts={}, elapsed={:.3}, failure={:?})",
                self.samples, self.dropped, self.timeouts, self.elapsed, self.failure
            )
        }
    }

    impl From<AcquisitionReport> for PyAcquisitionReport {
        fn from(r: AcquisitionReport) -> Self {
            PyAcquisitionReport {
                samples: r.samples,
                dropped: r.dropped,
                timeouts: r.timeouts,
                elapsed: r.elapsed.as_secs_f64(),
                failure: r.failure().map(str::to_string),
            }
        }
    }

    /// Light sensor on a serial port.
    ///
    /// Example:
    ///     >>> sensor = LightSensor("/dev/ttyACM0")
    ///     >>> sensor.set_background(10)
    ///     >>> full, ir, vis, ferr, ierr, verr = sensor.collect_data(10)
    ///     >>> sensor.close()
    #[pyclass(name = "LightSensor", unsendable)]
    struct PyLightSensor {
        inner: Option<LightSensor<SerialConnection>>,
        port: String,
    }

    impl PyLightSensor {
        fn sensor(&self) -> PyResult<&LightSensor<SerialConnection>> {
            self.inner
                .as_ref()
                .ok_or_else(|| PyConnectionError::new_err(format!("{} is closed", self.port)))
        }

        fn sensor_mut(&mut self) -> PyResult<&mut LightSensor<SerialConnection>> {
            let port = self.port.clone();
            self.inner
                .as_mut()
                .ok_or_else(|| PyConnectionError::new_err(format!("{port} is closed")))
        }
    }

    #[pymethods]
    impl PyLightSensor {
        /// Open the sensor's serial port (9600 baud, 2 s read timeout by default).
        #[new]
        #[pyo3(signature = (port, baud_rate=DEFAULT_BAUD_RATE, timeout=2.0))]
        fn new(port: &str, baud_rate: u32, timeout: f64) -> PyResult<Self> {
            let settings = SerialSettings {
                port: port.to_string(),
                baud_rate,
                timeout: seconds(timeout)?,
            };
            let conn = SerialConnection::open(&settings).map_err(to_py_err)?;
            Ok(PyLightSensor {
                inner: Some(LightSensor::new(conn)),
                port: settings.port,
            })
        }

        /// Names of the available serial ports.
        #[staticmethod]
        fn list_ports() -> PyResult<Vec<String>> {
            list_ports().map_err(to_py_err)
        }

        /// Gain labels with their multipliers.
        #[staticmethod]
        fn multipliers<'py>(py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
            let dict = PyDict::new(py);
            for (label, m) in multiplier_table() {
                dict.set_item(label, m)?;
            }
            Ok(dict)
        }

        /// Close the serial port. Further calls raise ConnectionError.
        fn close(&mut self) {
            if let Some(sensor) = self.inner.take() {
                sensor.into_connection().close();
            }
        }

        /// Collect raw samples for `duration` seconds.
        fn read(&mut self, duration: f64) -> PyResult<PyAcquisitionReport> {
            let duration = seconds(duration)?;
            Ok(self.sensor_mut()?.read(duration).into())
        }

        /// Measure the background; returns (full, ir, vis, ferr, ierr, verr).
        fn set_background(&mut self, duration: f64) -> PyResult<Sextuple> {
            let duration = seconds(duration)?;
            self.sensor_mut()?
                .set_background(duration)
                .map(sextuple)
                .map_err(to_py_err)
        }

        fn reset_background(&mut self) -> PyResult<()> {
            self.sensor_mut()?.reset_background();
            Ok(())
        }

        /// Current background as (full, ir, vis, ferr, ierr, verr).
        fn background(&self) -> PyResult<Sextuple> {
            Ok(sextuple(self.sensor()?.background()))
        }

        /// Collect for `duration` seconds, subtract the background and return
        /// (full, ir, vis, ferr, ierr, verr).
        fn collect_data(&mut self, duration: f64) -> PyResult<Sextuple> {
            let duration = seconds(duration)?;
            self.sensor_mut()?
                .collect_data(duration)
                .map(|m| sextuple(m.summary))
                .map_err(to_py_err)
        }

        /// Means and total errors of the latest run.
        fn get_average(&self) -> PyResult<Sextuple> {
            self.sensor()?.summary().map(sextuple).map_err(to_py_err)
        }

        fn average(&self) -> PyResult<Triple> {
            self.sensor()?.average().map(triple).map_err(to_py_err)
        }

        fn standard_deviation(&self) -> PyResult<Triple> {
            self.sensor()?.standard_deviation().map(triple).map_err(to_py_err)
        }

        fn fluctuation_error(&self) -> PyResult<Triple> {
            self.sensor()?.fluctuation_error().map(triple).map_err(to_py_err)
        }

        fn integer_error(&self) -> PyResult<Triple> {
            self.sensor()?.integer_error().map(triple).map_err(to_py_err)
        }

        fn total_error(&self) -> PyResult<Triple> {
            self.sensor()?.total_error().map(triple).map_err(to_py_err)
        }

        /// Copies of the latest run: (full, ir, vis, seconds).
        #[allow(clippy::type_complexity)]
        fn get_recent(&self) -> PyResult<(Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>)> {
            let snap = self.sensor()?.recent();
            Ok((snap.full, snap.ir, snap.visible, snap.seconds))
        }

        /// Gain label of every sample in the latest run.
        fn get_gain(&self) -> PyResult<Vec<&'static str>> {
            Ok(self
                .sensor()?
                .gain_history()
                .into_iter()
                .map(Gain::label)
                .collect())
        }

        fn __repr__(&self) -> String {
            let state = if self.inner.is_some() { "open" } else { "closed" };
            format!("LightSensor(port={:?}, {state})", self.port)
        }
    }

    /// Route Rust log records to Python's `logging` at `level` ("debug", "info", ...).
    #[pyfunction]
    #[pyo3(signature = (level=None))]
    fn set_log_level(py: Python<'_>, level: Option<&str>) -> PyResult<()> {
        logging::set_python_log_level(py, level)
    }

    /// The Python module definition
    #[pymodule]
    fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
        logging::init_python_logging(m.py())?;
        m.add_class::<PyLightSensor>()?;
        m.add_class::<PyAcquisitionReport>()?;
        m.add_function(wrap_pyfunction!(set_log_level, m)?)?;

        m.add("DEFAULT_BAUD_RATE", DEFAULT_BAUD_RATE)?;
        m.add("GAIN_CODES", Gain::ALL.iter().map(|g| g.code()).collect::<Vec<_>>())?;

        Ok(())
    }
}
