//! Session logger on removable storage
//!
//! [`Logger`] owns a [`StorageVolume`] and writes one session per boot:
//!
//! ```text
//! run_<N>/
//!     data.csv    "sep=," line, column header, one row per record
//!     log.txt     "<us> us [LOG] : <message>" / "<us> us [ERR] : <message>"
//! ```
//!
//! `N` is the number of directories found in the volume root at mount time.
//! Every write opens its file in append mode and closes it again before
//! returning, so a power cut loses at most the call in progress.
//!
//! If any step of opening the session fails the logger is `Degraded` for the
//! rest of its life: writes return [`StorageError::Unavailable`] and never
//! touch the volume.

#[cfg(feature = "sdmmc")]
pub mod sdmmc;

use core::fmt::Write;

use heapless::String;

use crate::clock::Clock;
use crate::queue::Consumer;
use crate::record::{CSV_HEADER, CompositeRecord, ROW_CAPACITY};

/// Room for one log line including timestamp and tag
pub const LINE_CAPACITY: usize = 160;

/// Room for the session directory name
pub const NAME_CAPACITY: usize = 24;

/// File system operations the logger needs
///
/// Directory arguments are names relative to the volume root.
pub trait StorageVolume {
    /// Media or file system error
    type Error;
    /// Handle of an open file
    type File;

    /// Mount the file system
    ///
    /// # Errors
    ///
    /// Returns an error if the card does not answer or holds no usable volume.
    fn mount(&mut self) -> Result<(), Self::Error>;

    /// Number of directories in the volume root
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be listed.
    fn count_root_dirs(&mut self) -> Result<usize, Self::Error>;

    /// Create a directory in the volume root
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists or cannot be created.
    fn create_dir(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Create a new, empty file; fails if it already exists
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists or cannot be created.
    fn create_file(&mut self, dir: &str, name: &str) -> Result<Self::File, Self::Error>;

    /// Open an existing file positioned at its end
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    fn open_append(&mut self, dir: &str, name: &str) -> Result<Self::File, Self::Error>;

    /// Append bytes to an open file
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes could not be written.
    fn write(&mut self, file: &mut Self::File, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Flush and close a file
    ///
    /// # Errors
    ///
    /// Returns an error if pending data could not be flushed.
    fn close(&mut self, file: Self::File) -> Result<(), Self::Error>;
}

/// Storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError<E> {
    /// The logger is degraded; nothing was written
    Unavailable,
    /// The volume reported an error
    Volume(E),
    /// A line or row did not fit its buffer
    Format,
}

impl<E> From<E> for StorageError<E> {
    fn from(error: E) -> Self {
        Self::Volume(error)
    }
}

/// Logger lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoggerState {
    /// Constructed, session not opened yet
    Uninitialized,
    /// Opening the session
    Mounting,
    /// Session open, writes go to the volume
    Ready,
    /// Session could not be opened; every write fails
    Degraded,
}

/// File and directory names of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoggerConfig {
    /// Data file name inside the session directory
    pub data_filename: &'static str,
    /// Log file name inside the session directory
    pub log_filename: &'static str,
    /// Session directory prefix, followed by the run number
    pub dir_prefix: &'static str,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            data_filename: "data.csv",
            log_filename: "log.txt",
            dir_prefix: "run_",
        }
    }
}

#[derive(Clone, Copy)]
enum Level {
    Log,
    Err,
}

impl Level {
    const fn tag(self) -> &'static str {
        match self {
            Self::Log => "LOG",
            Self::Err => "ERR",
        }
    }
}

/// Session logger
pub struct Logger<V, C> {
    volume: V,
    clock: C,
    config: LoggerConfig,
    state: LoggerState,
    session: String<NAME_CAPACITY>,
}

impl<V, C> Logger<V, C>
where
    V: StorageVolume,
    C: Clock,
{
    /// Mount the volume and open a new session
    ///
    /// Never fails: check [`Logger::state`] to see whether the session opened.
    pub fn new(volume: V, clock: C, config: LoggerConfig) -> Self {
        let mut logger = Self {
            volume,
            clock,
            config,
            state: LoggerState::Uninitialized,
            session: String::new(),
        };

        logger.state = LoggerState::Mounting;
        logger.state = match logger.open_session() {
            Ok(()) => {
                #[cfg(feature = "defmt")]
                defmt::info!("Logging to {}", logger.session.as_str());
                LoggerState::Ready
            }
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Storage unavailable, logger degraded");
                logger.session.clear();
                LoggerState::Degraded
            }
        };
        logger
    }

    fn open_session(&mut self) -> Result<(), StorageError<V::Error>> {
        self.volume.mount()?;

        let run = self.volume.count_root_dirs()?;
        write!(self.session, "{}{}", self.config.dir_prefix, run)
            .map_err(|_| StorageError::Format)?;
        self.volume.create_dir(&self.session)?;

        let mut data = self
            .volume
            .create_file(&self.session, self.config.data_filename)?;
        let written = self.volume.write(&mut data, CSV_HEADER.as_bytes());
        self.volume.close(data)?;
        written?;

        let log = self
            .volume
            .create_file(&self.session, self.config.log_filename)?;
        self.volume.close(log)?;
        Ok(())
    }

    /// Append an informational line to the log file
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` when degraded, `Format` if the line is too long,
    /// or the volume error.
    pub fn write_log(&mut self, message: &str) -> Result<(), StorageError<V::Error>> {
        self.write_line(Level::Log, message)
    }

    /// Append an error line to the log file
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` when degraded, `Format` if the line is too long,
    /// or the volume error.
    pub fn write_error(&mut self, message: &str) -> Result<(), StorageError<V::Error>> {
        #[cfg(feature = "defmt")]
        defmt::error!("{}", message);
        self.write_line(Level::Err, message)
    }

    fn write_line(&mut self, level: Level, message: &str) -> Result<(), StorageError<V::Error>> {
        self.ensure_ready()?;

        let mut line: String<LINE_CAPACITY> = String::new();
        writeln!(line, "{} us [{}] : {}", self.clock.now_us(), level.tag(), message)
            .map_err(|_| StorageError::Format)?;
        self.append(self.config.log_filename, line.as_bytes())
    }

    /// Append one record to the data file
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` when degraded, or the volume error.
    pub fn write_data(&mut self, record: &CompositeRecord) -> Result<(), StorageError<V::Error>> {
        self.ensure_ready()?;

        let mut row: String<ROW_CAPACITY> = String::new();
        record
            .write_csv_row(&mut row)
            .map_err(|_| StorageError::Format)?;
        self.append(self.config.data_filename, row.as_bytes())
    }

    /// Pop every waiting record and append them in one open/append/close cycle
    ///
    /// Returns the number of rows written. When degraded the records are still
    /// popped and discarded, so the producer never laps a dead consumer.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` when degraded, or the first volume error. Rows
    /// written before the failure stay in the file, the record whose write
    /// failed is lost, and records not yet popped stay queued.
    pub fn drain<const N: usize>(
        &mut self,
        consumer: &mut Consumer<'_, CompositeRecord, N>,
    ) -> Result<usize, StorageError<V::Error>> {
        if self.state != LoggerState::Ready {
            while consumer.pop().is_some() {}
            return Err(StorageError::Unavailable);
        }
        if consumer.is_empty() {
            return Ok(0);
        }

        let mut file = self
            .volume
            .open_append(&self.session, self.config.data_filename)?;
        let written = self.write_rows(&mut file, consumer);
        let closed = self.volume.close(file);

        let count = written?;
        closed?;
        Ok(count)
    }

    fn write_rows<const N: usize>(
        &mut self,
        file: &mut V::File,
        consumer: &mut Consumer<'_, CompositeRecord, N>,
    ) -> Result<usize, StorageError<V::Error>> {
        let mut count = 0;
        while let Some(record) = consumer.pop() {
            let mut row: String<ROW_CAPACITY> = String::new();
            record
                .write_csv_row(&mut row)
                .map_err(|_| StorageError::Format)?;
            self.volume.write(file, row.as_bytes())?;
            count += 1;
        }
        Ok(count)
    }

    /// Smoke test: one log line and one all-zero data row
    ///
    /// # Errors
    ///
    /// Returns the first failing write's error.
    pub fn test_connection(&mut self) -> Result<(), StorageError<V::Error>> {
        self.write_log("TEST SD CARD")?;
        self.write_data(&CompositeRecord::default())
    }

    fn ensure_ready(&self) -> Result<(), StorageError<V::Error>> {
        if self.state == LoggerState::Ready {
            Ok(())
        } else {
            Err(StorageError::Unavailable)
        }
    }

    fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageError<V::Error>> {
        let mut file = self.volume.open_append(&self.session, name)?;
        let written = self.volume.write(&mut file, bytes);
        let closed = self.volume.close(file);
        written?;
        closed?;
        Ok(())
    }

    /// Current lifecycle state
    pub const fn state(&self) -> LoggerState {
        self.state
    }

    /// Session directory name (empty unless the session opened)
    pub fn session_dir(&self) -> &str {
        &self.session
    }

    /// Names used for this session
    pub const fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Consume the logger and return the volume
    pub fn release(self) -> V {
        self.volume
    }
}
