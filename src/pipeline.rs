//! The two loops of the logger and the startup self-test
//!
//! - [`Acquisition`] runs on the sensor core: poll both sensors, assemble a
//!   [`CompositeRecord`], push it, repeat until told to stop, then hand over
//!   with the shutdown handshake.
//! - [`StorageLoop`] runs on the storage core: drain the queue into the data
//!   file whenever records are waiting and react to control words.

use core::fmt::Write;

use heapless::String;

use crate::channel::{self, Command, ControlChannel, HandshakeError};
use crate::clock::Clock;
use crate::queue::{Consumer, Producer};
use crate::record::CompositeRecord;
use crate::sensors::{Bmp280Reading, ImuReading, Sensor};
use crate::storage::{Logger, StorageError, StorageVolume};

/// Statistics of a finished acquisition run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquisitionReport {
    /// Records pushed
    pub iterations: u64,
    /// Sensor updates that failed on the bus
    pub transport_errors: u32,
}

/// Sensor-side loop
pub struct Acquisition<'q, M, B, K, const N: usize> {
    imu: M,
    baro: B,
    producer: Producer<'q, CompositeRecord, N>,
    clock: K,
    report: AcquisitionReport,
}

impl<'q, M, B, K, const N: usize> Acquisition<'q, M, B, K, N>
where
    M: Sensor<Reading = ImuReading>,
    B: Sensor<Reading = Bmp280Reading>,
    K: Clock,
{
    /// Create the loop from initialised sensors
    pub fn new(imu: M, baro: B, producer: Producer<'q, CompositeRecord, N>, clock: K) -> Self {
        Self {
            imu,
            baro,
            producer,
            clock,
            report: AcquisitionReport::default(),
        }
    }

    /// One iteration: update both sensors, push a record with the latest readings
    ///
    /// A sensor whose update fails keeps its previous reading in the record.
    pub fn step(&mut self) -> CompositeRecord {
        let now = self.clock.now_us();
        if self.imu.update(now).is_err() {
            self.transport_error("MPU-6050");
        }
        if self.baro.update(now).is_err() {
            self.transport_error("BMP280");
        }

        let record = CompositeRecord::from_readings(
            self.clock.now_us(),
            &self.imu.reading(),
            &self.baro.reading(),
        );
        self.producer.push(record);
        self.report.iterations += 1;
        record
    }

    fn transport_error(&mut self, _sensor: &str) {
        self.report.transport_errors = self.report.transport_errors.saturating_add(1);
        #[cfg(feature = "defmt")]
        defmt::error!("{} update failed", _sensor);
    }

    /// Step until `stop` returns true for the latest record, then shut down
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedReply` if the storage side does not echo the
    /// shutdown request.
    pub fn run<C, S>(&mut self, channel: &mut C, mut stop: S) -> Result<AcquisitionReport, HandshakeError>
    where
        C: ControlChannel + ?Sized,
        S: FnMut(&CompositeRecord) -> bool,
    {
        loop {
            let record = self.step();
            if stop(&record) {
                break;
            }
        }
        self.shutdown(channel)?;
        Ok(self.report)
    }

    /// Ask the storage side to flush and stop, and wait for its echo
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedReply` on any reply other than the echo.
    pub fn shutdown<C>(&mut self, channel: &mut C) -> Result<(), HandshakeError>
    where
        C: ControlChannel + ?Sized,
    {
        channel::request_shutdown(channel)
    }

    /// Counters so far
    pub const fn report(&self) -> &AcquisitionReport {
        &self.report
    }

    /// The accelerometer/gyroscope
    pub fn imu(&mut self) -> &mut M {
        &mut self.imu
    }

    /// The barometer
    pub fn baro(&mut self) -> &mut B {
        &mut self.baro
    }
}

/// Statistics of a finished storage run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StorageReport {
    /// Rows written to the data file
    pub drained: usize,
    /// Drains that failed or found the logger degraded
    pub write_failures: u32,
}

/// Storage-side loop
pub struct StorageLoop<'q, V, K, C, const N: usize> {
    logger: Logger<V, K>,
    consumer: Consumer<'q, CompositeRecord, N>,
    channel: C,
    report: StorageReport,
}

impl<'q, V, K, C, const N: usize> StorageLoop<'q, V, K, C, N>
where
    V: StorageVolume,
    K: Clock,
    C: ControlChannel,
{
    /// Create the loop; the logger should already have opened its session
    pub fn new(logger: Logger<V, K>, consumer: Consumer<'q, CompositeRecord, N>, channel: C) -> Self {
        Self {
            logger,
            consumer,
            channel,
            report: StorageReport::default(),
        }
    }

    /// Poll until the shutdown request has been handled
    pub fn run(&mut self) -> StorageReport {
        while !self.poll() {}
        self.report
    }

    /// One pass: drain waiting records, then check for a control word
    ///
    /// Returns true once the shutdown request has been acknowledged.
    pub fn poll(&mut self) -> bool {
        if !self.consumer.is_empty() {
            self.drain();
        }

        if !self.channel.has_data() {
            return false;
        }

        let word = self.channel.read_blocking();
        match Command::from_word(word) {
            Some(Command::Shutdown) => {
                self.finish();
                true
            }
            Some(Command::Flush) => {
                self.drain();
                false
            }
            None => {
                let mut message: String<32> = String::new();
                if write!(message, "Unknown command 0x{word:08X}").is_ok() {
                    let _ = self.logger.write_error(&message);
                }
                false
            }
        }
    }

    fn finish(&mut self) {
        // Every record pushed before the request must be on the card before the echo
        self.drain();
        if self.logger.write_log("Shutting down storage core").is_err() {
            self.report.write_failures = self.report.write_failures.saturating_add(1);
        }
        channel::acknowledge_shutdown(&mut self.channel);

        #[cfg(feature = "defmt")]
        defmt::info!("Storage stopped after {} rows", self.report.drained);
    }

    fn drain(&mut self) {
        match self.logger.drain(&mut self.consumer) {
            Ok(count) => self.report.drained += count,
            Err(_) => self.report.write_failures = self.report.write_failures.saturating_add(1),
        }
    }

    /// Counters so far
    pub const fn report(&self) -> &StorageReport {
        &self.report
    }

    /// The session logger
    pub fn logger(&mut self) -> &mut Logger<V, K> {
        &mut self.logger
    }

    /// Consume the loop and return the logger
    pub fn into_logger(self) -> Logger<V, K> {
        self.logger
    }
}

/// Write the end-of-run counters to the session log
///
/// The line goes out as an error when any sensor update or storage write
/// failed during the run.
///
/// # Errors
///
/// Returns the logger's error if the line could not be written.
pub fn log_run_summary<V, K>(
    logger: &mut Logger<V, K>,
    acquisition: &AcquisitionReport,
    storage: &StorageReport,
) -> Result<(), StorageError<V::Error>>
where
    V: StorageVolume,
    K: Clock,
{
    let mut message: String<128> = String::new();
    write!(
        message,
        "{} records, {} transport errors, {} rows written, {} failed writes",
        acquisition.iterations, acquisition.transport_errors, storage.drained, storage.write_failures
    )
    .map_err(|_| StorageError::Format)?;

    if acquisition.transport_errors > 0 || storage.write_failures > 0 {
        logger.write_error(&message)
    } else {
        logger.write_log(&message)
    }
}

/// Part of the system checked at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Component {
    /// MPU-6050
    Imu,
    /// BMP280
    Barometer,
    /// SD card
    Storage,
}

/// Run every component's connectivity test in order
///
/// Each result is written to the session log. Stops at the first failure; a
/// bus error counts as a failure.
///
/// # Errors
///
/// Returns the first component whose test failed.
pub fn self_test<M, B, V, K>(imu: &mut M, baro: &mut B, logger: &mut Logger<V, K>) -> Result<(), Component>
where
    M: Sensor,
    B: Sensor,
    V: StorageVolume,
    K: Clock,
{
    check(logger, "MPU6050", matches!(imu.test_connection(), Ok(true)), Component::Imu)?;
    check(logger, "BMP280", matches!(baro.test_connection(), Ok(true)), Component::Barometer)?;
    let storage_ok = logger.test_connection().is_ok();
    check(logger, "SD card", storage_ok, Component::Storage)
}

fn check<V, K>(logger: &mut Logger<V, K>, name: &str, passed: bool, component: Component) -> Result<(), Component>
where
    V: StorageVolume,
    K: Clock,
{
    let mut message: String<48> = String::new();
    let outcome = if passed { "successful" } else { "failed" };
    let _ = write!(message, "{name} connection {outcome}");

    if passed {
        let _ = logger.write_log(&message);
        Ok(())
    } else {
        #[cfg(feature = "defmt")]
        defmt::error!("{} self-test failed", component);
        let _ = logger.write_error(&message);
        Err(component)
    }
}
