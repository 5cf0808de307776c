//! Unit tests for the MPU-6050 driver: configuration, conversion and rate limiting

use crate::common::{MockError, assert_float_eq, create_mpu};
use datalogger::sensors::mpu6050::reg;
use datalogger::{AccelRange, Error, GyroOffset, GyroScale, Mpu6050Config, Sensor};

#[test]
fn test_init_writes_configuration_registers() {
    let (mut imu, interface) = create_mpu(Mpu6050Config::default());
    imu.init().unwrap();

    assert_eq!(interface.writes_to(reg::PWR_MGMT_1), vec![0x00]);
    assert_eq!(interface.writes_to(reg::GYRO_CONFIG), vec![0x10]);
    assert_eq!(interface.writes_to(reg::ACCEL_CONFIG), vec![0x00]);
    assert_eq!(interface.writes_to(reg::CONFIG), vec![0x06]);
}

#[test]
fn test_set_scale_and_range_update_registers() {
    let (mut imu, interface) = create_mpu(Mpu6050Config::default());

    imu.set_accel_range(AccelRange::G16).unwrap();
    imu.set_gyro_scale(GyroScale::Dps2000).unwrap();

    assert_eq!(interface.get_register(reg::ACCEL_CONFIG), 0x18);
    assert_eq!(interface.get_register(reg::GYRO_CONFIG), 0x18);
    assert_eq!(imu.config().accel_range, AccelRange::G16);
    assert_eq!(imu.config().gyro_scale, GyroScale::Dps2000);
}

#[test]
fn test_failed_range_write_keeps_old_range() {
    let (mut imu, interface) = create_mpu(Mpu6050Config::default());
    interface.fail_next_write();

    let result = imu.set_accel_range(AccelRange::G8);
    assert_eq!(result, Err(Error::Bus(MockError::Communication)));
    assert_eq!(imu.config().accel_range, AccelRange::G2);
}

#[test]
fn test_one_g_at_2g_range() {
    let config = Mpu6050Config {
        accel_range: AccelRange::G2,
        ..Mpu6050Config::default()
    };
    let (mut imu, interface) = create_mpu(config);
    imu.init().unwrap();
    interface.set_imu_data([16384, 0, 0], 0, [0, 0, 0]);

    assert!(imu.update(0).unwrap());
    let reading = imu.reading();
    assert_float_eq(reading.accel.x, 1.0, 1e-6);
    assert_float_eq(reading.accel.y, 0.0, 1e-6);
    assert_float_eq(reading.accel.z, 0.0, 1e-6);
}

#[test]
fn test_zero_raw_temperature() {
    let (mut imu, interface) = create_mpu(Mpu6050Config::default());
    imu.init().unwrap();
    interface.set_imu_data([0, 0, 0], 0, [0, 0, 0]);

    imu.update(0).unwrap();
    assert_float_eq(imu.reading().temperature, 36.53, 1e-4);
}

#[test]
fn test_burst_is_decoded_big_endian_in_order() {
    let (mut imu, interface) = create_mpu(Mpu6050Config::default());
    imu.init().unwrap();
    interface.set_imu_data([1, -2, 300], -340, [-4, 5, -600]);
    interface.clear_operations();

    imu.update(0).unwrap();

    let raw = imu.raw();
    assert_eq!(raw.accel, [1, -2, 300]);
    assert_eq!(raw.temperature, -340);
    assert_eq!(raw.gyro, [-4, 5, -600]);
    assert_eq!(interface.read_transactions(), 1, "one 14-byte burst");
    assert_eq!(interface.accesses().len(), 14);
    assert_float_eq(imu.reading().temperature, 35.53, 1e-4);
}

#[test]
fn test_gyro_scaling_with_offset() {
    let config = Mpu6050Config {
        gyro_scale: GyroScale::Dps250,
        ..Mpu6050Config::default()
    };
    let (mut imu, interface) = create_mpu(config);
    imu.init().unwrap();
    imu.set_offset(GyroOffset {
        x: 10.0,
        y: -10.0,
        z: 131.0,
    });
    interface.set_imu_data([0, 0, 0], 0, [141, 121, 0]);

    imu.update(0).unwrap();
    let gyro = imu.reading().gyro;
    assert_float_eq(gyro.x, 1.0, 1e-4);
    assert_float_eq(gyro.y, 1.0, 1e-4);
    assert_float_eq(gyro.z, -1.0, 1e-4);
}

#[test]
fn test_update_respects_sample_period() {
    // 1000 Hz: one update per 1000 us
    let (mut imu, interface) = create_mpu(Mpu6050Config::default());
    imu.init().unwrap();
    interface.clear_operations();

    assert!(imu.update(10_000).unwrap());
    assert!(!imu.update(10_500).unwrap());
    assert!(!imu.update(10_999).unwrap());
    assert_eq!(interface.read_transactions(), 1, "no bus traffic while gated");
    assert!(imu.update(11_000).unwrap());
    assert_eq!(interface.read_transactions(), 2);
}

#[test]
fn test_failed_update_keeps_reading_and_retries() {
    let (mut imu, interface) = create_mpu(Mpu6050Config::default());
    imu.init().unwrap();
    interface.set_imu_data([16384, 0, 0], 0, [0, 0, 0]);
    imu.update(0).unwrap();
    let before = imu.reading();

    interface.set_imu_data([0, 16384, 0], 0, [0, 0, 0]);
    interface.fail_next_read();
    assert!(imu.update(1_000).is_err());
    assert_eq!(imu.reading(), before);

    // Gate did not advance, so the next poll reads immediately
    assert!(imu.update(1_001).unwrap());
    assert_float_eq(imu.reading().accel.y, 1.0, 1e-6);
}

#[test]
fn test_partial_updates_touch_only_their_field() {
    let (mut imu, interface) = create_mpu(Mpu6050Config::default());
    imu.init().unwrap();
    interface.set_imu_data([16384, 0, 0], 340, [0, 0, 0]);
    imu.update_all().unwrap();

    interface.set_imu_data([0, 0, 16384], 0, [328, 0, 0]);
    imu.update_only_gyro().unwrap();
    let reading = imu.reading();
    assert_float_eq(reading.gyro.x, 10.0, 1e-4);
    assert_float_eq(reading.accel.x, 1.0, 1e-6);
    assert_float_eq(reading.temperature, 37.53, 1e-4);

    imu.update_only_acc().unwrap();
    assert_float_eq(imu.reading().accel.z, 1.0, 1e-6);
    assert_float_eq(imu.reading().temperature, 37.53, 1e-4);

    imu.update_only_temp().unwrap();
    assert_float_eq(imu.reading().temperature, 36.53, 1e-4);
}

#[test]
fn test_previous_reading_is_kept() {
    let (mut imu, interface) = create_mpu(Mpu6050Config::default());
    imu.init().unwrap();

    interface.set_imu_data([16384, 0, 0], 0, [0, 0, 0]);
    imu.update_all().unwrap();
    interface.set_imu_data([0, 16384, 0], 0, [0, 0, 0]);
    imu.update_all().unwrap();

    assert_float_eq(imu.previous().accel.x, 1.0, 1e-6);
    assert_float_eq(imu.reading().accel.y, 1.0, 1e-6);
}

#[test]
fn test_connection_checks_device_signature() {
    let (mut imu, interface) = create_mpu(Mpu6050Config::default());
    assert!(imu.test_connection().unwrap());

    interface.set_register(reg::WHO_AM_I, 0x70);
    assert!(!imu.test_connection().unwrap());

    interface.fail_next_read();
    assert!(imu.test_connection().is_err());
}
