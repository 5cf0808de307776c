//! Test utilities and helper functions

use crate::common::mock_interface::MockInterface;
use datalogger::{Bmp280, Bmp280Config, Clock, Mpu6050, Mpu6050Config};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// BMP280 calibration block from the datasheet example
///
/// Decodes to T1..T3 = 27504, 26435, -1000 and
/// P1..P9 = 36477, -10685, 3024, 2855, 140, -7, 15500, -14600, 6000.
pub const BMP_CALIBRATION: [u8; 24] = [
    112, 107, 67, 103, 24, 252, 125, 142, 67, 214, 208, 11, 39, 11, 140, 0, 249, 255, 140, 60, 248,
    198, 112, 23,
];

/// Mock delay implementation for testing
///
/// Does not sleep; accumulates the requested time so tests can check it.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockDelay {
    /// Total requested delay in nanoseconds
    pub total_ns: u64,
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.total_ns += u64::from(us) * 1_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns += u64::from(ms) * 1_000_000;
    }
}

/// Hand-driven monotonic clock; clones share the same time
///
/// With a non-zero tick every `now_us` call advances the clock afterwards,
/// which lets a loop make progress without a real timer.
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    now: Arc<AtomicU64>,
    tick_us: u64,
}

impl MockClock {
    /// Clock frozen at `start_us`
    pub fn new(start_us: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_us)),
            tick_us: 0,
        }
    }

    /// Clock that advances by `tick_us` on every read
    pub fn ticking(start_us: u64, tick_us: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_us)),
            tick_us,
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, now_us: u64) {
        self.now.store(now_us, Ordering::SeqCst);
    }

    /// Move time forward
    pub fn advance(&self, us: u64) {
        self.now.fetch_add(us, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_us(&self) -> u64 {
        self.now.fetch_add(self.tick_us, Ordering::SeqCst)
    }
}

/// Create a mock MPU-6050 driver
/// Returns (driver, interface) where interface is a clone that shares state with the driver
pub fn create_mpu(config: Mpu6050Config) -> (Mpu6050<MockInterface>, MockInterface) {
    let interface = MockInterface::new();
    let interface_clone = interface.clone();
    (Mpu6050::new(interface, config), interface_clone)
}

/// Create a mock BMP280 driver with the datasheet calibration block staged
/// Returns (driver, interface) where interface is a clone that shares state with the driver
pub fn create_bmp(config: Bmp280Config) -> (Bmp280<MockInterface>, MockInterface) {
    let interface = MockInterface::new();
    interface.set_bmp_calibration(&BMP_CALIBRATION);
    let interface_clone = interface.clone();
    (Bmp280::new(interface, config), interface_clone)
}

/// Assert that two floating point values are approximately equal
pub fn assert_float_eq(a: f32, b: f32, epsilon: f32) {
    let diff = (a - b).abs();
    assert!(
        diff < epsilon,
        "Values not equal within epsilon: {} vs {} (diff: {}, epsilon: {})",
        a,
        b,
        diff,
        epsilon
    );
}
