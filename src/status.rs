//! Status colours shown on the board's RGB LED

use embedded_hal::delay::DelayNs;

/// An RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Rgb {
    /// LED off
    pub const OFF: Self = Self::new(0, 0, 0);

    /// Create a colour from its components
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Startup and run checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// Power-on, nothing initialised yet
    Booting,
    /// Gyro calibration in progress; keep the board still
    Calibrating,
    /// A connectivity self-test failed
    TestFailed,
    /// Every component answered its self-test
    Ready,
    /// Acquisition loop running
    Running,
    /// Shutdown handshake completed
    Finished,
    /// Unrecoverable failure
    Fatal,
}

impl Status {
    /// Colour for this checkpoint
    #[must_use]
    pub const fn color(self) -> Rgb {
        match self {
            Self::Booting | Self::Fatal => Rgb::new(255, 0, 0),
            Self::Calibrating => Rgb::new(0, 255, 0),
            Self::TestFailed => Rgb::new(100, 0, 100),
            Self::Ready => Rgb::new(0, 100, 0),
            Self::Running => Rgb::new(100, 100, 0),
            Self::Finished => Rgb::new(0, 0, 200),
        }
    }
}

/// Sink for status colours
pub trait StatusIndicator {
    /// Display a colour until the next call
    fn show(&mut self, color: Rgb);

    /// Display the colour of a checkpoint
    fn set_status(&mut self, status: Status) {
        self.show(status.color());
    }
}

/// Half period of the fatal blink
pub const FATAL_BLINK_MS: u32 = 100;

/// Blink the fatal colour forever
///
/// Used when no safe recovery exists, e.g. after a failed shutdown handshake.
pub fn fatal<S, D>(indicator: &mut S, delay: &mut D) -> !
where
    S: StatusIndicator + ?Sized,
    D: DelayNs,
{
    #[cfg(feature = "defmt")]
    defmt::error!("Fatal failure, halting");

    loop {
        indicator.set_status(Status::Fatal);
        delay.delay_ms(FATAL_BLINK_MS);
        indicator.show(Rgb::OFF);
        delay.delay_ms(FATAL_BLINK_MS);
    }
}
