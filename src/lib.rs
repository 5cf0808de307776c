#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod channel;
pub mod clock;
pub mod interface;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod sensors;
pub mod status;
pub mod storage;

// Re-export main types
pub use channel::{Command, ControlChannel, HandshakeError};
pub use clock::{Clock, SampleTimer};
pub use interface::{ByteOrder, I2cInterface, RegisterBus};
pub use pipeline::{
    Acquisition, AcquisitionReport, Component, StorageLoop, StorageReport, log_run_summary,
    self_test,
};
pub use queue::{Consumer, Producer, SampleQueue};
pub use record::CompositeRecord;
pub use sensors::{
    AccelRange, Bmp280, Bmp280Config, Bmp280Reading, CalibrationParams, GyroOffset, GyroScale,
    ImuReading, Mpu6050, Mpu6050Config, Sensor, Vector3,
};
pub use status::{Rgb, Status, StatusIndicator};
pub use storage::{Logger, LoggerConfig, LoggerState, StorageError, StorageVolume};

/// MPU-6050 I2C address when AD0 pin is low (default: 0x68)
pub const MPU6050_ADDRESS_AD0_LOW: u8 = 0x68;

/// MPU-6050 I2C address when AD0 pin is high (alternative: 0x69)
pub const MPU6050_ADDRESS_AD0_HIGH: u8 = 0x69;

/// Expected value of the MPU-6050 `WHO_AM_I` register
///
/// The register reports bits 6:1 of the factory address regardless of the AD0
/// strap, so this is the same for both bus addresses.
pub const MPU6050_WHO_AM_I: u8 = 0x68;

/// BMP280 I2C address when SDO pin is low (default: 0x76)
pub const BMP280_ADDRESS_SDO_LOW: u8 = 0x76;

/// BMP280 I2C address when SDO pin is high (alternative: 0x77)
pub const BMP280_ADDRESS_SDO_HIGH: u8 = 0x77;

/// Expected value of the BMP280 chip id register
pub const BMP280_CHIP_ID: u8 = 0x58;

/// Driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Communication error with the device (transport error)
    Bus(E),
    /// Invalid configuration parameter
    InvalidConfig,
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Self::Bus(error)
    }
}
