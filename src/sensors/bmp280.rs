//! BMP280 barometric pressure sensor driver
//!
//! Temperature and pressure are compensated with the integer algorithms from
//! the Bosch datasheet (section 8.2): a 32-bit "fine temperature" and a 64-bit
//! pressure polynomial returning Pa in Q24.8. Both reproduce the reference
//! implementation bit for bit.

use crate::clock::SampleTimer;
use crate::interface::{ByteOrder, RegisterBus};
use crate::sensors::Sensor;
use crate::{BMP280_CHIP_ID, Error};

/// Register addresses used by the driver
pub mod reg {
    /// First byte of the factory calibration block (`dig_T1` LSB)
    pub const CALIB_00: u8 = 0x88;
    /// Chip identity
    pub const ID: u8 = 0xD0;
    /// Soft reset
    pub const RESET: u8 = 0xE0;
    /// Measurement status
    pub const STATUS: u8 = 0xF3;
    /// Oversampling and power mode
    pub const CTRL_MEAS: u8 = 0xF4;
    /// Standby time and IIR filter
    pub const CONFIG: u8 = 0xF5;
    /// First of the 6 data registers (press MSB..XLSB, temp MSB..XLSB)
    pub const PRESS_MSB: u8 = 0xF7;
}

/// Oversampling setting for one measurement channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bmp280Oversampling {
    /// Measurement skipped (output 0x80000)
    Skipped = 0,
    /// ×1
    X1 = 1,
    /// ×2
    X2 = 2,
    /// ×4
    X4 = 3,
    /// ×8
    X8 = 4,
    /// ×16
    X16 = 5,
}

/// Power mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bmp280Mode {
    /// No measurements
    Sleep = 0,
    /// Single measurement, then back to sleep
    Forced = 1,
    /// Continuous measurements with standby in between
    Normal = 3,
}

/// IIR filter coefficient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bmp280Filter {
    /// Filter off
    Off = 0,
    /// Coefficient 2
    X2 = 1,
    /// Coefficient 4
    X4 = 2,
    /// Coefficient 8
    X8 = 3,
    /// Coefficient 16
    X16 = 4,
}

/// Standby time between measurements in normal mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bmp280Standby {
    /// 0.5 ms
    Ms0_5 = 0,
    /// 62.5 ms
    Ms62_5 = 1,
    /// 125 ms
    Ms125 = 2,
    /// 250 ms
    Ms250 = 3,
    /// 500 ms
    Ms500 = 4,
    /// 1000 ms
    Ms1000 = 5,
    /// 2000 ms
    Ms2000 = 6,
    /// 4000 ms
    Ms4000 = 7,
}

/// BMP280 configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bmp280Config {
    /// Temperature oversampling
    pub temperature_oversampling: Bmp280Oversampling,
    /// Pressure oversampling
    pub pressure_oversampling: Bmp280Oversampling,
    /// Power mode
    pub mode: Bmp280Mode,
    /// IIR filter coefficient
    pub filter: Bmp280Filter,
    /// Standby time in normal mode
    pub standby: Bmp280Standby,
    /// Maximum rate at which `update` reads the device, in Hz
    pub sample_rate_hz: u32,
}

impl Default for Bmp280Config {
    fn default() -> Self {
        Self {
            temperature_oversampling: Bmp280Oversampling::X1,
            pressure_oversampling: Bmp280Oversampling::X4,
            mode: Bmp280Mode::Normal,
            filter: Bmp280Filter::X4,
            standby: Bmp280Standby::Ms0_5,
            sample_rate_hz: 100,
        }
    }
}

impl Bmp280Config {
    /// Value of the `CTRL_MEAS` register (`osrs_t[7:5] osrs_p[4:2] mode[1:0]`)
    #[must_use]
    pub const fn ctrl_meas(&self) -> u8 {
        ((self.temperature_oversampling as u8) << 5)
            | ((self.pressure_oversampling as u8) << 2)
            | self.mode as u8
    }

    /// Value of the `CONFIG` register (`t_sb[7:5] filter[4:2]`, SPI 3-wire off)
    #[must_use]
    pub const fn config_register(&self) -> u8 {
        ((self.standby as u8) << 5) | ((self.filter as u8) << 2)
    }
}

/// Factory trimming coefficients
///
/// Read once from the 24-byte block at `0x88` as little-endian words:
/// `dig_T1` and `dig_P1` unsigned, everything else signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub struct CalibrationParams {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
}

impl CalibrationParams {
    /// Size of the calibration block in bytes
    pub const SIZE: usize = 24;

    /// Decode the calibration block
    #[must_use]
    pub fn from_bytes(block: &[u8; Self::SIZE]) -> Self {
        let le = ByteOrder::Little;
        Self {
            dig_t1: le.u16_at(block, 0),
            dig_t2: le.i16_at(block, 1),
            dig_t3: le.i16_at(block, 2),
            dig_p1: le.u16_at(block, 3),
            dig_p2: le.i16_at(block, 4),
            dig_p3: le.i16_at(block, 5),
            dig_p4: le.i16_at(block, 6),
            dig_p5: le.i16_at(block, 7),
            dig_p6: le.i16_at(block, 8),
            dig_p7: le.i16_at(block, 9),
            dig_p8: le.i16_at(block, 10),
            dig_p9: le.i16_at(block, 11),
        }
    }

    /// Encode back into the on-chip block layout
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        #[allow(clippy::cast_sign_loss)]
        let words: [u16; 12] = [
            self.dig_t1,
            self.dig_t2 as u16,
            self.dig_t3 as u16,
            self.dig_p1,
            self.dig_p2 as u16,
            self.dig_p3 as u16,
            self.dig_p4 as u16,
            self.dig_p5 as u16,
            self.dig_p6 as u16,
            self.dig_p7 as u16,
            self.dig_p8 as u16,
            self.dig_p9 as u16,
        ];

        let mut block = [0u8; Self::SIZE];
        for (chunk, word) in block.chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&ByteOrder::Little.u16_to(word));
        }
        block
    }

    /// Fine temperature from a 20-bit raw temperature
    ///
    /// Shared by the temperature output and the pressure compensation.
    #[must_use]
    pub fn fine_temperature(&self, adc_t: i32) -> i32 {
        let t1 = i32::from(self.dig_t1);
        let t2 = i32::from(self.dig_t2);
        let t3 = i32::from(self.dig_t3);

        let dt = (adc_t >> 4).wrapping_sub(t1);
        let var1 = (adc_t >> 3).wrapping_sub(t1 << 1).wrapping_mul(t2) >> 11;
        let var2 = (dt.wrapping_mul(dt) >> 12).wrapping_mul(t3) >> 14;
        var1.wrapping_add(var2)
    }

    /// Compensated pressure in Pa as unsigned Q24.8
    ///
    /// Returns 0 when the first-order term vanishes (e.g. `dig_P1 == 0`)
    /// instead of dividing by zero.
    #[must_use]
    pub fn compensate_pressure(&self, adc_p: i32, fine_temperature: i32) -> u32 {
        let (p1, p2, p3) = (i64::from(self.dig_p1), i64::from(self.dig_p2), i64::from(self.dig_p3));
        let (p4, p5, p6) = (i64::from(self.dig_p4), i64::from(self.dig_p5), i64::from(self.dig_p6));
        let (p7, p8, p9) = (i64::from(self.dig_p7), i64::from(self.dig_p8), i64::from(self.dig_p9));

        // Two's complement wraparound like the reference C code on the target
        let mut var1 = i64::from(fine_temperature) - 128_000;
        let mut var2 = var1.wrapping_mul(var1).wrapping_mul(p6);
        var2 = var2.wrapping_add(var1.wrapping_mul(p5) << 17);
        var2 = var2.wrapping_add(p4 << 35);
        var1 = (var1.wrapping_mul(var1).wrapping_mul(p3) >> 8).wrapping_add(var1.wrapping_mul(p2) << 12);
        var1 = (1i64 << 47).wrapping_add(var1).wrapping_mul(p1) >> 33;
        if var1 == 0 {
            return 0;
        }

        let mut p = 1_048_576 - i64::from(adc_p);
        p = (p << 31).wrapping_sub(var2).wrapping_mul(3125).wrapping_div(var1);
        var1 = p9.wrapping_mul(p >> 13).wrapping_mul(p >> 13) >> 25;
        var2 = p8.wrapping_mul(p) >> 19;
        p = (p.wrapping_add(var1).wrapping_add(var2) >> 8).wrapping_add(p7 << 4);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let pressure = p as u32;
        pressure
    }
}

/// Temperature in °C from the fine temperature
///
/// The datasheet formula yields hundredths of a degree.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn temperature_from_fine(fine_temperature: i32) -> f32 {
    (fine_temperature.wrapping_mul(5).wrapping_add(128) >> 8) as f32 / 100.0
}

/// Physical reading from the BMP280
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bmp280Reading {
    /// Temperature in °C
    pub temperature_c: f32,
    /// Pressure in Pa
    pub pressure_pa: f32,
}

/// BMP280 driver
pub struct Bmp280<I> {
    interface: I,
    config: Bmp280Config,
    calibration: CalibrationParams,
    timer: SampleTimer,
    reading: Bmp280Reading,
}

impl<I> Bmp280<I>
where
    I: RegisterBus,
{
    /// Create a new driver instance
    ///
    /// Does not touch the bus; call [`Sensor::init`] to configure the device
    /// and load its calibration block.
    pub fn new(interface: I, config: Bmp280Config) -> Self {
        Self {
            interface,
            timer: SampleTimer::from_rate_hz(config.sample_rate_hz),
            config,
            calibration: CalibrationParams::default(),
            reading: Bmp280Reading::default(),
        }
    }

    /// Read the raw 20-bit pressure and temperature ADC values
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_raw(&mut self) -> Result<(i32, i32), Error<I::Error>> {
        let mut buffer = [0u8; 6];
        self.interface.read(reg::PRESS_MSB, &mut buffer)?;

        #[allow(clippy::cast_possible_wrap)]
        let adc_p = (ByteOrder::Big.u24_at(&buffer, 0) >> 4) as i32;
        #[allow(clippy::cast_possible_wrap)]
        let adc_t = (ByteOrder::Big.u24_at(&buffer, 1) >> 4) as i32;
        Ok((adc_p, adc_t))
    }

    /// Read and compensate one sample regardless of the rate limit
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn measure(&mut self) -> Result<Bmp280Reading, Error<I::Error>> {
        let (adc_p, adc_t) = self.read_raw()?;
        let fine = self.calibration.fine_temperature(adc_t);
        let pressure = self.calibration.compensate_pressure(adc_p, fine);

        #[allow(clippy::cast_precision_loss)]
        let reading = Bmp280Reading {
            temperature_c: temperature_from_fine(fine),
            pressure_pa: pressure as f32 / 256.0,
        };
        self.reading = reading;
        Ok(reading)
    }

    /// Factory calibration loaded by `init`
    pub const fn calibration(&self) -> &CalibrationParams {
        &self.calibration
    }

    /// Current configuration
    pub const fn config(&self) -> &Bmp280Config {
        &self.config
    }

    /// Last compensated temperature in °C
    pub const fn temperature(&self) -> f32 {
        self.reading.temperature_c
    }

    /// Consume the driver and return the underlying interface
    pub fn release(self) -> I {
        self.interface
    }
}

impl<I> Sensor for Bmp280<I>
where
    I: RegisterBus,
{
    type Reading = Bmp280Reading;
    type Error = Error<I::Error>;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.interface
            .write_u8(reg::CTRL_MEAS, self.config.ctrl_meas())?;
        self.interface
            .write_u8(reg::CONFIG, self.config.config_register())?;

        let mut block = [0u8; CalibrationParams::SIZE];
        self.interface.read(reg::CALIB_00, &mut block)?;
        self.calibration = CalibrationParams::from_bytes(&block);
        self.timer.reset();

        #[cfg(feature = "defmt")]
        defmt::debug!("BMP280 calibration loaded: {}", self.calibration);

        Ok(())
    }

    fn update(&mut self, now_us: u64) -> Result<bool, Self::Error> {
        if !self.timer.is_due(now_us) {
            return Ok(false);
        }
        self.measure()?;
        self.timer.mark(now_us);
        Ok(true)
    }

    fn test_connection(&mut self) -> Result<bool, Self::Error> {
        let id = self.interface.read_u8(reg::ID)?;
        Ok(id == BMP280_CHIP_ID)
    }

    fn reading(&self) -> Bmp280Reading {
        self.reading
    }
}
