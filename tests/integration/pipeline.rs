//! Integration tests running both loops the way the firmware does:
//! sensors and acquisition on the test thread, storage on a second thread,
//! connected by the sample queue and the control channel.

use crate::common::mock_channel;
use crate::common::{
    MockClock, MockDelay, MockVolume, Step, assert_float_eq, create_bmp, create_mpu,
};
use datalogger::{
    Acquisition, AccelRange, Bmp280Config, CompositeRecord, ControlChannel, HandshakeError, Logger,
    LoggerConfig, LoggerState, Mpu6050Config, SampleQueue, Sensor, StorageLoop, self_test,
};

const ITERATIONS: u64 = 30;

fn parse_row(line: &str) -> (u64, Vec<f32>) {
    let mut fields = line.split(',');
    let time = fields.next().unwrap().parse().unwrap();
    let values = fields.map(|f| f.parse().unwrap()).collect();
    (time, values)
}

#[test]
fn test_complete_logging_session() {
    let config = Mpu6050Config {
        accel_range: AccelRange::G2,
        ..Mpu6050Config::default()
    };
    let (mut imu, imu_bus) = create_mpu(config);
    let (mut baro, baro_bus) = create_bmp(Bmp280Config::default());
    let clock = MockClock::ticking(1_000, 100);
    let volume = MockVolume::with_existing_dirs(2);
    let mut logger = Logger::new(volume.clone(), clock.clone(), LoggerConfig::default());
    assert_eq!(logger.state(), LoggerState::Ready);

    // Startup on the sensor core
    imu.init().unwrap();
    baro.init().unwrap();
    imu_bus.set_gyro_sequence(vec![[40, -40, 8]]);
    imu.calibrate(50, &mut MockDelay::default()).unwrap();
    assert_eq!(self_test(&mut imu, &mut baro, &mut logger), Ok(()));

    // Stationary board, lying flat, datasheet pressure
    imu_bus.set_imu_data([0, 0, 16384], 0, [40, -40, 8]);
    baro_bus.set_bmp_adc(415_148, 519_888);

    let mut queue: SampleQueue<CompositeRecord, 64> = SampleQueue::new();
    let (producer, consumer) = queue.split();
    let (mut core0, core1) = mock_channel::pair();

    let (acquisition_report, storage_report) = std::thread::scope(|scope| {
        let mut storage = StorageLoop::new(logger, consumer, core1);
        let worker = scope.spawn(move || storage.run());

        let mut acquisition = Acquisition::new(&mut imu, &mut baro, producer, clock.clone());
        let mut count = 0;
        let report = acquisition
            .run(&mut core0, |_| {
                count += 1;
                count == ITERATIONS
            })
            .unwrap();
        (report, worker.join().unwrap())
    });

    assert_eq!(acquisition_report.iterations, ITERATIONS);
    assert_eq!(acquisition_report.transport_errors, 0);
    assert_eq!(storage_report.drained, ITERATIONS as usize);
    assert_eq!(storage_report.write_failures, 0);

    // Header, the self-test row, then one row per iteration
    let lines = volume.lines("run_2", "data.csv");
    assert_eq!(lines.len(), 2 + 1 + ITERATIONS as usize);

    let mut last_time = 0;
    for line in &lines[3..] {
        let (time, values) = parse_row(line);
        assert!(time > last_time, "timestamps increase");
        last_time = time;

        assert_eq!(values.len(), 7);
        assert_float_eq(values[0], 0.0, 1e-6);
        assert_float_eq(values[2], 1.0, 1e-6);
        for rate in &values[3..6] {
            assert_float_eq(*rate, 0.0, 1e-6);
        }
        assert_float_eq(values[6], 100_653.25, 0.01);
    }

    let log = volume.lines("run_2", "log.txt");
    assert!(log.last().unwrap().ends_with("[LOG] : Shutting down storage core"));
}

#[test]
fn test_transport_errors_are_counted_and_do_not_stop_acquisition() {
    let (imu, imu_bus) = create_mpu(Mpu6050Config::default());
    let (baro, baro_bus) = create_bmp(Bmp280Config::default());
    let mut queue: SampleQueue<CompositeRecord, 8> = SampleQueue::new();
    let (producer, mut consumer) = queue.split();
    let mut acquisition = Acquisition::new(imu, baro, producer, MockClock::ticking(0, 20_000));

    acquisition.imu().init().unwrap();
    acquisition.baro().init().unwrap();
    imu_bus.set_imu_data([16384, 0, 0], 0, [0, 0, 0]);
    baro_bus.set_bmp_adc(415_148, 519_888);

    let good = acquisition.step();
    imu_bus.set_imu_data([0, 16384, 0], 0, [0, 0, 0]);
    imu_bus.fail_next_read();
    let stale = acquisition.step();
    let fresh = acquisition.step();

    assert_eq!(acquisition.report().transport_errors, 1);
    assert_eq!(acquisition.report().iterations, 3);
    assert_eq!(stale.acceleration, good.acceleration, "failed update keeps old reading");
    assert_eq!(fresh.acceleration, [0.0, 1.0, 0.0]);
    assert_eq!(consumer.pop(), Some(good));
    assert_eq!(consumer.pop(), Some(stale));
    assert_eq!(consumer.pop(), Some(fresh));
}

#[test]
fn test_degraded_storage_still_completes_handshake() {
    let (imu, _imu_bus) = create_mpu(Mpu6050Config::default());
    let (baro, _baro_bus) = create_bmp(Bmp280Config::default());
    let volume = MockVolume::new();
    volume.fail(Step::CreateDir);
    let logger = Logger::new(volume.clone(), MockClock::new(0), LoggerConfig::default());
    assert_eq!(logger.state(), LoggerState::Degraded);

    let mut queue: SampleQueue<CompositeRecord, 64> = SampleQueue::new();
    let (producer, consumer) = queue.split();
    let (mut core0, core1) = mock_channel::pair();

    let storage_report = std::thread::scope(|scope| {
        let mut storage = StorageLoop::new(logger, consumer, core1);
        let worker = scope.spawn(move || storage.run());

        let mut acquisition = Acquisition::new(imu, baro, producer, MockClock::ticking(0, 500));
        let mut remaining = 20;
        acquisition
            .run(&mut core0, |_| {
                remaining -= 1;
                remaining == 0
            })
            .unwrap();
        worker.join().unwrap()
    });

    assert_eq!(storage_report.drained, 0);
    assert!(storage_report.write_failures > 0);
    assert_eq!(volume.file_count(), 0);
}

#[test]
fn test_wrong_reply_fails_acquisition() {
    let (imu, _imu_bus) = create_mpu(Mpu6050Config::default());
    let (baro, _baro_bus) = create_bmp(Bmp280Config::default());
    let mut queue: SampleQueue<CompositeRecord, 8> = SampleQueue::new();
    let (producer, _consumer) = queue.split();
    let (mut core0, mut core1) = mock_channel::pair();

    let result = std::thread::scope(|scope| {
        scope.spawn(move || {
            let _ = core1.read_blocking();
            core1.write_blocking(0xDEAD);
        });
        let mut acquisition = Acquisition::new(imu, baro, producer, MockClock::new(0));
        acquisition.run(&mut core0, |_| true)
    });

    assert_eq!(result, Err(HandshakeError::UnexpectedReply(0xDEAD)));
}
