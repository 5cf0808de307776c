//! Sensor drivers for the logger
//!
//! Both devices on the bus implement the [`Sensor`] capability set:
//! - MPU-6050 accelerometer/gyroscope/thermometer
//! - BMP280 barometer/thermometer
//!
//! Each driver owns its register interface and the calibration state read from
//! (or computed on) the device, and keeps the last physical reading.

pub mod bmp280;
pub mod mpu6050;

// Re-export main types
pub use bmp280::{
    Bmp280, Bmp280Config, Bmp280Filter, Bmp280Mode, Bmp280Oversampling, Bmp280Reading,
    Bmp280Standby, CalibrationParams,
};
pub use mpu6050::{AccelRange, GyroOffset, GyroScale, ImuRaw, ImuReading, Mpu6050, Mpu6050Config};

/// Capability set shared by every sensor on the bus
pub trait Sensor {
    /// Physical reading produced by a successful update
    type Reading: Copy;
    /// Error returned when the bus transaction fails
    type Error;

    /// Write the device configuration and load any factory calibration
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Read and convert a new sample if the output period has elapsed
    ///
    /// Returns `Ok(false)` without touching the bus when called again before
    /// the configured sampling period has passed since the last successful
    /// update. On error the previous reading is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    fn update(&mut self, now_us: u64) -> Result<bool, Self::Error>;

    /// Check the identity register against the known device signature
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    fn test_connection(&mut self) -> Result<bool, Self::Error>;

    /// Most recent physical reading
    fn reading(&self) -> Self::Reading;
}

impl<S: Sensor + ?Sized> Sensor for &mut S {
    type Reading = S::Reading;
    type Error = S::Error;

    fn init(&mut self) -> Result<(), Self::Error> {
        (**self).init()
    }

    fn update(&mut self, now_us: u64) -> Result<bool, Self::Error> {
        (**self).update(now_us)
    }

    fn test_connection(&mut self) -> Result<bool, Self::Error> {
        (**self).test_connection()
    }

    fn reading(&self) -> Self::Reading {
        (**self).reading()
    }
}

/// Three-axis floating point vector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Vector3 {
    /// X-axis component
    pub x: f32,
    /// Y-axis component
    pub y: f32,
    /// Z-axis component
    pub z: f32,
}

impl Vector3 {
    /// All-zero vector
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Create a vector from its components
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Components as an `[x, y, z]` array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Euclidean length of the vector
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        libm::sqrtf(self.x * self.x + self.y * self.y + self.z * self.z)
    }
}
