//! Inter-core control channel and the shutdown handshake
//!
//! The channel carries single 32-bit command words between the acquisition
//! and storage contexts. It is never used for sample data; that goes through
//! the [`SampleQueue`](crate::SampleQueue).
//!
//! Shutdown protocol:
//! 1. acquisition sends [`Command::Shutdown`] once its loop has ended
//! 2. storage sees the word in its poll, drains the queue a final time, writes
//!    a closing log line and echoes [`Command::Shutdown`]
//! 3. acquisition blocks for the reply and treats anything else as a fatal
//!    protocol violation

/// One endpoint of a single-slot blocking word channel
///
/// On the RP2040 both cores talk through the SIO mailbox FIFOs; each core
/// holds its own endpoint.
pub trait ControlChannel {
    /// Send a word, blocking while the peer's slot is full
    fn write_blocking(&mut self, word: u32);

    /// Receive a word, blocking until one is available
    fn read_blocking(&mut self) -> u32;

    /// Whether a word is waiting to be read
    fn has_data(&mut self) -> bool;

    /// Discard every word waiting to be read
    fn drain(&mut self) {
        while self.has_data() {
            let _ = self.read_blocking();
        }
    }
}

impl<C: ControlChannel + ?Sized> ControlChannel for &mut C {
    fn write_blocking(&mut self, word: u32) {
        (**self).write_blocking(word);
    }

    fn read_blocking(&mut self) -> u32 {
        (**self).read_blocking()
    }

    fn has_data(&mut self) -> bool {
        (**self).has_data()
    }

    fn drain(&mut self) {
        (**self).drain();
    }
}

/// Command words understood by the storage context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Command {
    /// Drain the sample queue now
    Flush = 0x0002,
    /// Final drain, then acknowledge by echoing this word
    Shutdown = 0xF003,
}

impl Command {
    /// Wire value of the command
    #[must_use]
    pub const fn word(self) -> u32 {
        self as u32
    }

    /// Decode a received word
    #[must_use]
    pub const fn from_word(word: u32) -> Option<Self> {
        match word {
            0x0002 => Some(Self::Flush),
            0xF003 => Some(Self::Shutdown),
            _ => None,
        }
    }
}

/// Shutdown handshake failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeError {
    /// The peer answered with something other than the shutdown echo
    UnexpectedReply(u32),
}

/// Send the shutdown request and wait for the echo
///
/// # Errors
///
/// Returns `UnexpectedReply` if the first word received is not the echo.
pub fn request_shutdown<C>(channel: &mut C) -> Result<(), HandshakeError>
where
    C: ControlChannel + ?Sized,
{
    #[cfg(feature = "defmt")]
    defmt::info!("Requesting storage shutdown");

    channel.write_blocking(Command::Shutdown.word());
    match channel.read_blocking() {
        reply if reply == Command::Shutdown.word() => Ok(()),
        reply => Err(HandshakeError::UnexpectedReply(reply)),
    }
}

/// Confirm a completed shutdown to the requesting side
pub fn acknowledge_shutdown<C>(channel: &mut C)
where
    C: ControlChannel + ?Sized,
{
    channel.write_blocking(Command::Shutdown.word());
}
