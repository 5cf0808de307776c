//! The record that crosses the core boundary and its CSV form

use core::fmt::{self, Write};

use crate::sensors::{Bmp280Reading, ImuReading};

/// Header written once at the top of every data file
///
/// The `sep=,` line makes spreadsheet tools pick the separator regardless of
/// locale.
pub const CSV_HEADER: &str = "sep=,\ntime,acc_x,acc_y,acc_z,gyro_x,gyro_y,gyro_z,pressure\n";

/// Room for one formatted row including the newline
pub const ROW_CAPACITY: usize = 192;

/// One timestamped sample of every sensor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompositeRecord {
    /// Microseconds on the monotonic clock when the record was assembled
    pub timestamp_us: u64,
    /// Acceleration x, y, z in g
    pub acceleration: [f32; 3],
    /// Angular rate x, y, z in °/s
    pub angular_rate: [f32; 3],
    /// Pressure in Pa
    pub pressure: f32,
}

impl CompositeRecord {
    /// Assemble a record from the latest reading of each sensor
    #[must_use]
    pub fn from_readings(timestamp_us: u64, imu: &ImuReading, baro: &Bmp280Reading) -> Self {
        Self {
            timestamp_us,
            acceleration: imu.accel.to_array(),
            angular_rate: imu.gyro.to_array(),
            pressure: baro.pressure_pa,
        }
    }

    /// Append the record as one CSV row terminated by `\n`
    ///
    /// The timestamp is an integer, every other field has six decimals.
    ///
    /// # Errors
    ///
    /// Returns `fmt::Error` if the writer runs out of room.
    pub fn write_csv_row<W: Write>(&self, out: &mut W) -> fmt::Result {
        let [ax, ay, az] = self.acceleration;
        let [gx, gy, gz] = self.angular_rate;
        writeln!(
            out,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            self.timestamp_us, ax, ay, az, gx, gy, gz, self.pressure
        )
    }
}
