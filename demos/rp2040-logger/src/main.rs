//! Dual-core inertial/pressure logger for a Raspberry Pi Pico (RP2040)
//!
//! Core 0 calibrates the MPU-6050, self-tests every component, then samples the
//! MPU-6050 and BMP280 as fast as the bus allows and pushes one record per
//! iteration into the sample queue. Core 1 drains the queue into `run_N/data.csv`
//! on the SD card. After `RUN_SECONDS` core 0 requests shutdown over the SIO
//! FIFO; core 1 writes the remaining records, echoes the request and hands the
//! logger back.
//!
//! Hardware connections:
//! - I2C0 SDA: GPIO4, SCL: GPIO5 (MPU-6050 at 0x68, BMP280 at 0x76)
//! - SPI0 MISO: GPIO0, CS: GPIO1, SCK: GPIO2, MOSI: GPIO3 (SD card)
//! - WS2812 status LED: GPIO16
//!
//! Status colours:
//! - red: booting
//! - green: calibrating, keep the board still
//! - magenta: a self-test failed (see `log.txt`)
//! - dim green: ready, acquisition starts after one second
//! - yellow: logging
//! - blue: finished, safe to remove the card
//! - blinking red: shutdown handshake failed

#![no_std]
#![no_main]

use core::cell::RefCell;
use core::ptr::addr_of_mut;

use datalogger::queue::DEFAULT_QUEUE_LEN;
use datalogger::status::fatal;
use datalogger::storage::sdmmc::SdmmcVolume;
use datalogger::{
    AccelRange, Acquisition, Bmp280, Bmp280Config, Clock, CompositeRecord, ControlChannel,
    GyroScale, I2cInterface, Logger, LoggerConfig, Mpu6050, Mpu6050Config, Rgb, SampleQueue,
    Sensor, Status, StatusIndicator, StorageLoop, StorageReport, BMP280_ADDRESS_SDO_LOW,
    MPU6050_ADDRESS_AD0_LOW, log_run_summary, self_test,
};
use defmt::*;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::{
    bind_interrupts,
    config::Config,
    gpio::{Level, Output},
    i2c::{self, Config as I2cConfig, I2c},
    multicore::{spawn_core1, Stack},
    pac,
    peripherals::{I2C0, PIO0, SPI0},
    pio::{InterruptHandler as PioInterruptHandler, Pio},
    pio_programs::ws2812::{PioWs2812, PioWs2812Program},
    spi::{self, Spi},
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{block_for, Delay, Duration, Instant};
use embedded_hal_bus::i2c::RefCellDevice;
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use embedded_sdmmc::{SdCard, TimeSource, Timestamp, VolumeIdx, VolumeManager};
use panic_probe as _;
use smart_leds::RGB8;
use static_cell::StaticCell;

/// How long to log before shutting down
const RUN_SECONDS: u64 = 30;

/// Gyro samples averaged at startup
const CALIBRATION_SAMPLES: u16 = 1000;

/// SD card clock once the card is initialised
const SD_FREQUENCY: u32 = 12_500_000;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
});

type SdSpi = ExclusiveDevice<Spi<'static, SPI0, spi::Blocking>, Output<'static>, NoDelay>;
type SessionLogger = Logger<SdmmcVolume<SdCard<SdSpi, Delay>, FixedTime>, Uptime>;

static mut CORE1_STACK: Stack<8192> = Stack::new();
static QUEUE: StaticCell<SampleQueue<CompositeRecord, DEFAULT_QUEUE_LEN>> = StaticCell::new();
static HANDBACK: Signal<CriticalSectionRawMutex, (SessionLogger, StorageReport)> = Signal::new();

/// Microseconds since boot
#[derive(Clone, Copy)]
struct Uptime;

impl Clock for Uptime {
    fn now_us(&self) -> u64 {
        Instant::now().as_micros()
    }
}

/// The board has no RTC; files get the FAT epoch
struct FixedTime;

impl TimeSource for FixedTime {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 0,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

/// This core's end of the SIO inter-core FIFO
struct SioFifo;

impl ControlChannel for SioFifo {
    fn write_blocking(&mut self, word: u32) {
        let fifo = pac::SIO.fifo();
        while !fifo.st().read().rdy() {
            cortex_m::asm::nop();
        }
        fifo.wr().write_value(word);
        cortex_m::asm::sev();
    }

    fn read_blocking(&mut self) -> u32 {
        while !self.has_data() {
            cortex_m::asm::wfe();
        }
        pac::SIO.fifo().rd().read()
    }

    fn has_data(&mut self) -> bool {
        pac::SIO.fifo().st().read().vld()
    }
}

/// Single WS2812 on PIO0
struct StatusLed<'d> {
    ws2812: PioWs2812<'d, PIO0, 0, 1>,
}

impl StatusIndicator for StatusLed<'_> {
    fn show(&mut self, color: Rgb) {
        let pixel = [RGB8::new(color.r, color.g, color.b)];
        embassy_futures::block_on(self.ws2812.write(&pixel));
    }
}

fn idle() -> ! {
    loop {
        block_for(Duration::from_millis(1000));
    }
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Config::default());

    let Pio {
        mut common, sm0, ..
    } = Pio::new(p.PIO0, Irqs);
    let program = PioWs2812Program::new(&mut common);
    let mut led = StatusLed {
        ws2812: PioWs2812::new(&mut common, sm0, p.DMA_CH0, p.PIN_16, &program),
    };
    led.set_status(Status::Booting);

    // SD card: SPI clock must stay <= 400kHz until the card is initialised
    let mut sd_config = spi::Config::default();
    sd_config.frequency = 400_000;
    let sd_spi = Spi::new_blocking(p.SPI0, p.PIN_2, p.PIN_3, p.PIN_0, sd_config);
    let sd_cs = Output::new(p.PIN_1, Level::High);
    let sd_device = match ExclusiveDevice::new_no_delay(sd_spi, sd_cs) {
        Ok(device) => device,
        Err(_) => idle(),
    };
    let sdcard = SdCard::new(sd_device, Delay);
    match sdcard.num_bytes() {
        Ok(size) => info!("SD card size is {} bytes", size),
        Err(e) => warn!("SD card not ready: {:?}", Debug2Format(&e)),
    }
    let mut fast = spi::Config::default();
    fast.frequency = SD_FREQUENCY;
    sdcard.spi(|device| device.bus_mut().set_config(&fast));

    let volume = SdmmcVolume::new(VolumeManager::new(sdcard, FixedTime), VolumeIdx(0));
    let mut logger: SessionLogger = Logger::new(volume, Uptime, LoggerConfig::default());
    let _ = logger.write_log("RP2040 log start!");
    info!("Logging to {}", logger.session_dir());

    // Shared I2C0 bus at 400kHz
    let mut i2c_config = I2cConfig::default();
    i2c_config.frequency = 400_000;
    let i2c: I2c<'_, I2C0, i2c::Blocking> = I2c::new_blocking(p.I2C0, p.PIN_5, p.PIN_4, i2c_config);
    let bus = RefCell::new(i2c);

    let imu_config = Mpu6050Config {
        gyro_scale: GyroScale::Dps1000,
        accel_range: AccelRange::G16,
        ..Mpu6050Config::default()
    };
    let mut imu = Mpu6050::new(
        I2cInterface::new(RefCellDevice::new(&bus), MPU6050_ADDRESS_AD0_LOW),
        imu_config,
    );
    let mut baro = Bmp280::new(
        I2cInterface::new(RefCellDevice::new(&bus), BMP280_ADDRESS_SDO_LOW),
        Bmp280Config::default(),
    );

    let mut delay = Delay;
    if let Err(e) = imu.init() {
        error!("Failed to initialize MPU-6050: {:?}", e);
        let _ = logger.write_error("MPU6050 initialization failed");
    }
    if let Err(e) = baro.init() {
        error!("Failed to initialize BMP280: {:?}", e);
        let _ = logger.write_error("BMP280 initialization failed");
    }

    led.set_status(Status::Calibrating);
    info!("Calibrating gyroscope, keep the board still...");
    match imu.calibrate(CALIBRATION_SAMPLES, &mut delay) {
        Ok(offset) => info!("Gyro offset: {}", offset),
        Err(e) => {
            error!("Gyro calibration failed: {:?}", e);
            let _ = logger.write_error("Gyro calibration failed");
        }
    }

    let _ = logger.write_log("Initialized");
    if let Err(component) = self_test(&mut imu, &mut baro, &mut logger) {
        error!("{} self-test failed, halting", component);
        led.set_status(Status::TestFailed);
        idle();
    }

    led.set_status(Status::Ready);
    block_for(Duration::from_millis(1000));
    led.set_status(Status::Running);

    let queue = QUEUE.init(SampleQueue::new());
    let (producer, consumer) = queue.split();

    let _ = logger.write_log("Initialize finish starting core1...");
    let _ = logger.write_log("Starting loop...");
    spawn_core1(
        p.CORE1,
        unsafe { &mut *addr_of_mut!(CORE1_STACK) },
        move || {
            let mut storage = StorageLoop::new(logger, consumer, SioFifo);
            let report = storage.run();
            info!("Core 1 wrote {} rows, {} failed drains", report.drained, report.write_failures);
            HANDBACK.signal((storage.into_logger(), report));
            idle()
        },
    );

    let mut channel = SioFifo;
    channel.drain();

    let mut acquisition = Acquisition::new(&mut imu, &mut baro, producer, Uptime);
    let start = Uptime.now_us();
    let deadline = start + RUN_SECONDS * 1_000_000;
    let result = acquisition.run(&mut channel, |record| record.timestamp_us >= deadline);
    info!("Waiting for core1 to finish...");

    match result {
        Ok(report) => {
            info!(
                "Logged {} records, {} transport errors",
                report.iterations, report.transport_errors
            );
            let (mut logger, storage) = HANDBACK.wait().await;
            let _ = logger.write_log("Confirm Shutdown core1");

            let _ = log_run_summary(&mut logger, &report, &storage);
            let _ = logger.write_log("Shutdown core 0.");
            led.set_status(Status::Finished);
            idle()
        }
        Err(e) => {
            error!("Core 1 shutdown failed: {}", e);
            if let Some((mut logger, _)) = HANDBACK.try_take() {
                let _ = logger.write_error("Core1 shutdown failed");
            }
            fatal(&mut led, &mut delay)
        }
    }
}
