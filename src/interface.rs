//! Register transport for the sensors on the shared I2C bus
//!
//! [`I2cInterface`] binds an `embedded-hal` I2C bus to one device address and
//! implements the `device-driver` register seam. [`RegisterBus`] layers the
//! register-level operations the sensor drivers use on top of any such
//! interface: single-byte writes, exact-length burst reads and the
//! 16/24/32-bit compositions in either byte order.

use device_driver::RegisterInterface;
use embedded_hal::i2c::Operation;

/// I2C interface bound to a single device address
pub struct I2cInterface<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> I2cInterface<I2C> {
    /// Create a new I2C interface for the device at `address`
    ///
    /// # Arguments
    /// * `i2c` - The I2C bus (or a shared-bus device handle)
    /// * `address` - The 7-bit device address
    ///
    /// # Example
    /// ```ignore
    /// let interface = I2cInterface::new(i2c, datalogger::MPU6050_ADDRESS_AD0_LOW);
    /// let mut imu = Mpu6050::new(interface, Mpu6050Config::default());
    /// ```
    pub const fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Device address this interface talks to
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Consume the interface and return the I2C bus
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C, E> RegisterInterface for I2cInterface<I2C>
where
    I2C: embedded_hal::i2c::I2c<Error = E>,
{
    type Error = E;
    type AddressType = u8;

    fn read_register(
        &mut self,
        address: Self::AddressType,
        size_bits: u32,
        read_data: &mut [u8],
    ) -> Result<(), Self::Error> {
        let _ = size_bits; // Size is implicit in read_data.len() for I2C
        // Register select, repeated start, then a blocking read of exactly read_data.len() bytes
        self.i2c.write_read(self.address, &[address], read_data)
    }

    fn write_register(
        &mut self,
        address: Self::AddressType,
        size_bits: u32,
        write_data: &[u8],
    ) -> Result<(), Self::Error> {
        let _ = size_bits; // Size is implicit in write_data.len() for I2C
        // Adjacent writes go out as one frame: register byte, then the payload
        self.i2c.transaction(
            self.address,
            &mut [Operation::Write(&[address]), Operation::Write(write_data)],
        )
    }
}

/// Byte order used to compose multi-byte register values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteOrder {
    /// Least significant byte at the lowest register address
    Little,
    /// Most significant byte at the lowest register address
    Big,
}

impl ByteOrder {
    /// Compose two bytes into an unsigned 16-bit value
    #[must_use]
    pub const fn u16_from(self, bytes: [u8; 2]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        }
    }

    /// Compose two bytes into a signed 16-bit value
    #[must_use]
    pub const fn i16_from(self, bytes: [u8; 2]) -> i16 {
        match self {
            Self::Little => i16::from_le_bytes(bytes),
            Self::Big => i16::from_be_bytes(bytes),
        }
    }

    /// Compose three bytes into an unsigned 24-bit value (upper byte of the result is zero)
    #[must_use]
    pub const fn u24_from(self, bytes: [u8; 3]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]),
            Self::Big => u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]),
        }
    }

    /// Compose four bytes into an unsigned 32-bit value
    #[must_use]
    pub const fn u32_from(self, bytes: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        }
    }

    /// Split a 16-bit value into register bytes
    #[must_use]
    pub const fn u16_to(self, value: u16) -> [u8; 2] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    /// Split the low 24 bits of a value into register bytes
    #[must_use]
    pub const fn u24_to(self, value: u32) -> [u8; 3] {
        let [b0, b1, b2, _] = value.to_le_bytes();
        match self {
            Self::Little => [b0, b1, b2],
            Self::Big => [b2, b1, b0],
        }
    }

    /// Split a 32-bit value into register bytes
    #[must_use]
    pub const fn u32_to(self, value: u32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    /// Read the `index`-th unsigned 16-bit word from a burst buffer
    ///
    /// # Panics
    ///
    /// Panics if the buffer is shorter than `2 * (index + 1)` bytes.
    #[must_use]
    pub fn u16_at(self, buffer: &[u8], index: usize) -> u16 {
        let at = index * 2;
        self.u16_from([buffer[at], buffer[at + 1]])
    }

    /// Read the `index`-th signed 16-bit word from a burst buffer
    ///
    /// # Panics
    ///
    /// Panics if the buffer is shorter than `2 * (index + 1)` bytes.
    #[must_use]
    pub fn i16_at(self, buffer: &[u8], index: usize) -> i16 {
        let at = index * 2;
        self.i16_from([buffer[at], buffer[at + 1]])
    }

    /// Read the `index`-th 24-bit word from a burst buffer
    ///
    /// # Panics
    ///
    /// Panics if the buffer is shorter than `3 * (index + 1)` bytes.
    #[must_use]
    pub fn u24_at(self, buffer: &[u8], index: usize) -> u32 {
        let at = index * 3;
        self.u24_from([buffer[at], buffer[at + 1], buffer[at + 2]])
    }

    /// Read the `index`-th 32-bit word from a burst buffer
    ///
    /// # Panics
    ///
    /// Panics if the buffer is shorter than `4 * (index + 1)` bytes.
    #[must_use]
    pub fn u32_at(self, buffer: &[u8], index: usize) -> u32 {
        let at = index * 4;
        self.u32_from([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]])
    }
}

/// Register-level operations on top of a [`RegisterInterface`]
///
/// Every read fills the caller's buffer completely or returns the bus error;
/// callers never see partially transferred data.
pub trait RegisterBus: RegisterInterface<AddressType = u8> {
    /// Write one byte to a register (two-byte addressed write)
    ///
    /// # Errors
    ///
    /// Returns the bus error if the transaction fails.
    fn write_u8(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.write_register(register, 8, &[value])
    }

    /// Read `buffer.len()` consecutive registers starting at `register`
    ///
    /// # Errors
    ///
    /// Returns the bus error if the transaction fails.
    fn read(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        #[allow(clippy::cast_possible_truncation)]
        let size_bits = (buffer.len() * 8) as u32;
        self.read_register(register, size_bits, buffer)
    }

    /// Read a single register
    ///
    /// # Errors
    ///
    /// Returns the bus error if the transaction fails.
    fn read_u8(&mut self, register: u8) -> Result<u8, Self::Error> {
        let mut buffer = [0u8; 1];
        self.read(register, &mut buffer)?;
        Ok(buffer[0])
    }

    /// Read a 16-bit value from two consecutive registers
    ///
    /// # Errors
    ///
    /// Returns the bus error if the transaction fails.
    fn read_u16(&mut self, register: u8, order: ByteOrder) -> Result<u16, Self::Error> {
        let mut buffer = [0u8; 2];
        self.read(register, &mut buffer)?;
        Ok(order.u16_from(buffer))
    }

    /// Read a 24-bit value from three consecutive registers
    ///
    /// # Errors
    ///
    /// Returns the bus error if the transaction fails.
    fn read_u24(&mut self, register: u8, order: ByteOrder) -> Result<u32, Self::Error> {
        let mut buffer = [0u8; 3];
        self.read(register, &mut buffer)?;
        Ok(order.u24_from(buffer))
    }

    /// Read a 32-bit value from four consecutive registers
    ///
    /// # Errors
    ///
    /// Returns the bus error if the transaction fails.
    fn read_u32(&mut self, register: u8, order: ByteOrder) -> Result<u32, Self::Error> {
        let mut buffer = [0u8; 4];
        self.read(register, &mut buffer)?;
        Ok(order.u32_from(buffer))
    }

    /// Write a 16-bit value to two consecutive registers
    ///
    /// # Errors
    ///
    /// Returns the bus error if the transaction fails.
    fn write_u16(&mut self, register: u8, value: u16, order: ByteOrder) -> Result<(), Self::Error> {
        self.write_register(register, 16, &order.u16_to(value))
    }

    /// Write the low 24 bits of a value to three consecutive registers
    ///
    /// # Errors
    ///
    /// Returns the bus error if the transaction fails.
    fn write_u24(&mut self, register: u8, value: u32, order: ByteOrder) -> Result<(), Self::Error> {
        self.write_register(register, 24, &order.u24_to(value))
    }

    /// Write a 32-bit value to four consecutive registers
    ///
    /// # Errors
    ///
    /// Returns the bus error if the transaction fails.
    fn write_u32(&mut self, register: u8, value: u32, order: ByteOrder) -> Result<(), Self::Error> {
        self.write_register(register, 32, &order.u32_to(value))
    }
}

impl<T> RegisterBus for T where T: RegisterInterface<AddressType = u8> {}
