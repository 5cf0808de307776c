//! MPU-6050 accelerometer/gyroscope driver
//!
//! Provides full-scale configuration, stationary gyro bias calibration and
//! conversion of the raw big-endian output registers to g, °/s and °C.

use embedded_hal::delay::DelayNs;

use crate::clock::SampleTimer;
use crate::interface::{ByteOrder, RegisterBus};
use crate::sensors::{Sensor, Vector3};
use crate::{Error, MPU6050_WHO_AM_I};

/// Register addresses used by the driver
pub mod reg {
    /// Sample rate divider
    pub const SMPLRT_DIV: u8 = 0x19;
    /// Frame sync and digital low pass filter configuration
    pub const CONFIG: u8 = 0x1A;
    /// Gyroscope full-scale selection (bits 4:3)
    pub const GYRO_CONFIG: u8 = 0x1B;
    /// Accelerometer full-scale selection (bits 4:3)
    pub const ACCEL_CONFIG: u8 = 0x1C;
    /// First of the 14 output registers (accel x/y/z, temp, gyro x/y/z)
    pub const ACCEL_XOUT_H: u8 = 0x3B;
    /// Temperature output, high byte
    pub const TEMP_OUT_H: u8 = 0x41;
    /// First of the 6 gyroscope output registers
    pub const GYRO_XOUT_H: u8 = 0x43;
    /// Power management 1 (sleep, clock source)
    pub const PWR_MGMT_1: u8 = 0x6B;
    /// Device identity
    pub const WHO_AM_I: u8 = 0x75;
}

/// Delay between consecutive gyro samples during calibration
pub const CALIBRATION_INTERVAL_MS: u32 = 5;

/// Gyroscope full-scale range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GyroScale {
    /// ±250°/s range
    Dps250 = 0,
    /// ±500°/s range
    Dps500 = 1,
    /// ±1000°/s range
    Dps1000 = 2,
    /// ±2000°/s range
    Dps2000 = 3,
}

impl GyroScale {
    /// Digits per °/s for this range
    #[must_use]
    pub const fn sensitivity(self) -> f32 {
        match self {
            Self::Dps250 => 131.0,
            Self::Dps500 => 65.5,
            Self::Dps1000 => 32.8,
            Self::Dps2000 => 16.4,
        }
    }

    /// `GYRO_CONFIG` value selecting this range (`FS_SEL` in bits 4:3)
    #[must_use]
    pub const fn register_value(self) -> u8 {
        (self as u8) << 3
    }
}

/// Accelerometer full-scale range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccelRange {
    /// ±2g range
    G2 = 0,
    /// ±4g range
    G4 = 1,
    /// ±8g range
    G8 = 2,
    /// ±16g range
    G16 = 3,
}

impl AccelRange {
    /// Digits per g for this range
    #[must_use]
    pub const fn sensitivity(self) -> f32 {
        match self {
            Self::G2 => 16384.0,
            Self::G4 => 8192.0,
            Self::G8 => 4096.0,
            Self::G16 => 2048.0,
        }
    }

    /// `ACCEL_CONFIG` value selecting this range (`AFS_SEL` in bits 4:3)
    #[must_use]
    pub const fn register_value(self) -> u8 {
        (self as u8) << 3
    }
}

/// MPU-6050 configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mpu6050Config {
    /// Gyroscope full-scale range
    pub gyro_scale: GyroScale,
    /// Accelerometer full-scale range
    pub accel_range: AccelRange,
    /// `DLPF_CFG` value written to `CONFIG` (0-6, 6 = 5 Hz bandwidth)
    pub dlpf: u8,
    /// Maximum rate at which `update` reads the device, in Hz
    pub sample_rate_hz: u32,
}

impl Default for Mpu6050Config {
    fn default() -> Self {
        Self {
            gyro_scale: GyroScale::Dps1000,
            accel_range: AccelRange::G2,
            dlpf: 6,
            sample_rate_hz: 1000,
        }
    }
}

/// Per-axis gyroscope bias in raw digits
///
/// Computed by [`Mpu6050::calibrate`] while the device is stationary and
/// subtracted from every raw gyro reading before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GyroOffset {
    /// X-axis bias
    pub x: f32,
    /// Y-axis bias
    pub y: f32,
    /// Z-axis bias
    pub z: f32,
}

/// Raw output words of the last read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImuRaw {
    /// Accelerometer x, y, z
    pub accel: [i16; 3],
    /// Temperature
    pub temperature: i16,
    /// Gyroscope x, y, z
    pub gyro: [i16; 3],
}

/// Physical reading from the MPU-6050
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImuReading {
    /// Acceleration in g
    pub accel: Vector3,
    /// Angular rate in °/s (bias removed)
    pub gyro: Vector3,
    /// Die temperature in °C
    pub temperature: f32,
}

/// Convert raw accelerometer digits to g
#[must_use]
pub fn accel_from_raw(raw: [i16; 3], range: AccelRange) -> Vector3 {
    let sensitivity = range.sensitivity();
    Vector3::new(
        f32::from(raw[0]) / sensitivity,
        f32::from(raw[1]) / sensitivity,
        f32::from(raw[2]) / sensitivity,
    )
}

/// Convert raw gyroscope digits to °/s after removing the bias
#[must_use]
pub fn gyro_from_raw(raw: [i16; 3], offset: &GyroOffset, scale: GyroScale) -> Vector3 {
    let sensitivity = scale.sensitivity();
    Vector3::new(
        (f32::from(raw[0]) - offset.x) / sensitivity,
        (f32::from(raw[1]) - offset.y) / sensitivity,
        (f32::from(raw[2]) - offset.z) / sensitivity,
    )
}

/// Convert the raw temperature word to °C
///
/// Datasheet: `Temp_degC = TEMP_OUT / 340 + 36.53`
#[must_use]
pub fn temperature_from_raw(raw: i16) -> f32 {
    f32::from(raw) / 340.0 + 36.53
}

/// MPU-6050 driver
pub struct Mpu6050<I> {
    interface: I,
    config: Mpu6050Config,
    offset: GyroOffset,
    timer: SampleTimer,
    raw: ImuRaw,
    reading: ImuReading,
    previous: ImuReading,
}

impl<I> Mpu6050<I>
where
    I: RegisterBus,
{
    /// Create a new driver instance
    ///
    /// Does not touch the bus; call [`Sensor::init`] to configure the device.
    pub fn new(interface: I, config: Mpu6050Config) -> Self {
        Self {
            interface,
            timer: SampleTimer::from_rate_hz(config.sample_rate_hz),
            config,
            offset: GyroOffset::default(),
            raw: ImuRaw::default(),
            reading: ImuReading::default(),
            previous: ImuReading::default(),
        }
    }

    /// Select the gyroscope full-scale range
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails. The stored
    /// range is only changed once the register write succeeded.
    pub fn set_gyro_scale(&mut self, scale: GyroScale) -> Result<(), Error<I::Error>> {
        self.interface
            .write_u8(reg::GYRO_CONFIG, scale.register_value())?;
        self.config.gyro_scale = scale;
        Ok(())
    }

    /// Select the accelerometer full-scale range
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails. The stored
    /// range is only changed once the register write succeeded.
    pub fn set_accel_range(&mut self, range: AccelRange) -> Result<(), Error<I::Error>> {
        self.interface
            .write_u8(reg::ACCEL_CONFIG, range.register_value())?;
        self.config.accel_range = range;
        Ok(())
    }

    /// Calibrate the gyroscope bias by averaging stationary samples
    ///
    /// Takes `samples` consecutive raw gyro reads, `CALIBRATION_INTERVAL_MS`
    /// apart, and stores the per-axis mean as the new offset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for zero samples, or the bus error if any read
    /// fails (the previous offset is kept in that case).
    pub fn calibrate<D>(&mut self, samples: u16, delay: &mut D) -> Result<GyroOffset, Error<I::Error>>
    where
        D: DelayNs,
    {
        if samples == 0 {
            return Err(Error::InvalidConfig);
        }

        let mut sum = [0i64; 3];
        for _ in 0..samples {
            let raw = self.read_raw_gyro()?;
            for (acc, value) in sum.iter_mut().zip(raw) {
                *acc += i64::from(value);
            }
            delay.delay_ms(CALIBRATION_INTERVAL_MS);
        }

        let count = f32::from(samples);
        #[allow(clippy::cast_precision_loss)]
        let offset = GyroOffset {
            x: sum[0] as f32 / count,
            y: sum[1] as f32 / count,
            z: sum[2] as f32 / count,
        };

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Gyro offset from {} samples: x={} y={} z={}",
            samples,
            offset.x,
            offset.y,
            offset.z
        );

        self.offset = offset;
        Ok(offset)
    }

    /// Read all output registers in one burst and convert them
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn update_all(&mut self) -> Result<(), Error<I::Error>> {
        let mut buffer = [0u8; 14];
        self.interface.read(reg::ACCEL_XOUT_H, &mut buffer)?;

        let word = |index| ByteOrder::Big.i16_at(&buffer, index);
        let raw = ImuRaw {
            accel: [word(0), word(1), word(2)],
            temperature: word(3),
            gyro: [word(4), word(5), word(6)],
        };

        let reading = ImuReading {
            accel: accel_from_raw(raw.accel, self.config.accel_range),
            gyro: gyro_from_raw(raw.gyro, &self.offset, self.config.gyro_scale),
            temperature: temperature_from_raw(raw.temperature),
        };

        self.raw = raw;
        self.store(reading);
        Ok(())
    }

    /// Refresh only the acceleration
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn update_only_acc(&mut self) -> Result<(), Error<I::Error>> {
        let raw = self.read_raw_accel()?;
        self.raw.accel = raw;
        let reading = ImuReading {
            accel: accel_from_raw(raw, self.config.accel_range),
            ..self.reading
        };
        self.store(reading);
        Ok(())
    }

    /// Refresh only the temperature
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn update_only_temp(&mut self) -> Result<(), Error<I::Error>> {
        let raw = self.read_raw_temp()?;
        self.raw.temperature = raw;
        let reading = ImuReading {
            temperature: temperature_from_raw(raw),
            ..self.reading
        };
        self.store(reading);
        Ok(())
    }

    /// Refresh only the angular rate
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn update_only_gyro(&mut self) -> Result<(), Error<I::Error>> {
        let raw = self.read_raw_gyro()?;
        self.raw.gyro = raw;
        let reading = ImuReading {
            gyro: gyro_from_raw(raw, &self.offset, self.config.gyro_scale),
            ..self.reading
        };
        self.store(reading);
        Ok(())
    }

    /// Read raw accelerometer digits
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_raw_accel(&mut self) -> Result<[i16; 3], Error<I::Error>> {
        self.read_axes(reg::ACCEL_XOUT_H)
    }

    /// Read raw gyroscope digits (bias not removed)
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_raw_gyro(&mut self) -> Result<[i16; 3], Error<I::Error>> {
        self.read_axes(reg::GYRO_XOUT_H)
    }

    /// Read the raw temperature word
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_raw_temp(&mut self) -> Result<i16, Error<I::Error>> {
        let mut buffer = [0u8; 2];
        self.interface.read(reg::TEMP_OUT_H, &mut buffer)?;
        Ok(ByteOrder::Big.i16_from(buffer))
    }

    fn read_axes(&mut self, register: u8) -> Result<[i16; 3], Error<I::Error>> {
        // All 6 bytes in one transaction to prevent torn reads
        let mut buffer = [0u8; 6];
        self.interface.read(register, &mut buffer)?;
        Ok([
            ByteOrder::Big.i16_at(&buffer, 0),
            ByteOrder::Big.i16_at(&buffer, 1),
            ByteOrder::Big.i16_at(&buffer, 2),
        ])
    }

    fn store(&mut self, reading: ImuReading) {
        self.previous = self.reading;
        self.reading = reading;
    }

    /// Current configuration
    pub const fn config(&self) -> &Mpu6050Config {
        &self.config
    }

    /// Current gyroscope bias
    pub const fn offset(&self) -> &GyroOffset {
        &self.offset
    }

    /// Replace the gyroscope bias (e.g. with a stored calibration)
    pub fn set_offset(&mut self, offset: GyroOffset) {
        self.offset = offset;
    }

    /// Reset the gyroscope bias to zero
    pub fn clear_offset(&mut self) {
        self.offset = GyroOffset::default();
    }

    /// Raw words of the last read
    pub const fn raw(&self) -> &ImuRaw {
        &self.raw
    }

    /// Reading before the most recent one
    pub const fn previous(&self) -> &ImuReading {
        &self.previous
    }

    /// Consume the driver and return the underlying interface
    pub fn release(self) -> I {
        self.interface
    }
}

impl<I> Sensor for Mpu6050<I>
where
    I: RegisterBus,
{
    type Reading = ImuReading;
    type Error = Error<I::Error>;

    /// Wake the device and write range and filter configuration
    ///
    /// Clears any previously computed gyro bias.
    fn init(&mut self) -> Result<(), Self::Error> {
        // Clear SLEEP, internal 8 MHz oscillator
        self.interface.write_u8(reg::PWR_MGMT_1, 0x00)?;
        self.set_gyro_scale(self.config.gyro_scale)?;
        self.set_accel_range(self.config.accel_range)?;
        self.interface.write_u8(reg::CONFIG, self.config.dlpf & 0x07)?;
        self.offset = GyroOffset::default();
        self.timer.reset();

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "MPU-6050 configured: gyro={} accel={} dlpf={}",
            self.config.gyro_scale,
            self.config.accel_range,
            self.config.dlpf
        );

        Ok(())
    }

    fn update(&mut self, now_us: u64) -> Result<bool, Self::Error> {
        if !self.timer.is_due(now_us) {
            return Ok(false);
        }
        self.update_all()?;
        self.timer.mark(now_us);
        Ok(true)
    }

    fn test_connection(&mut self) -> Result<bool, Self::Error> {
        let who_am_i = self.interface.read_u8(reg::WHO_AM_I)?;
        Ok(who_am_i == MPU6050_WHO_AM_I)
    }

    fn reading(&self) -> ImuReading {
        self.reading
    }
}
