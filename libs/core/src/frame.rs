use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

use derive_more::{Display, LowerHex, UpperHex};
use thiserror::Error;

/// Start-of-header sentinel byte.
pub const SOH: u8 = 0x01;
/// Start-of-text sentinel byte, closing the header.
pub const STX: u8 = 0x02;
/// End-of-text sentinel byte, closing the payload.
pub const ETX: u8 = 0x03;
/// End-of-transmission sentinel byte, closing the frame.
pub const EOT: u8 = 0x04;

/// Default number of [`SOH`] sentinels written ahead of each frame.
///
/// Some UARTs drop the first byte after the line turns around, so transmitters
/// may be configured to repeat the sentinel. Receivers accept any run length.
pub const DEFAULT_SOH_REPEAT: usize = 1;

/// Errors related to building [`Frame`]s of data.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FrameError {
    /// [`Payload`] length exceeded the maximum of 255 bytes.
    #[error("Maximum payload length is {} bytes, got {}", max, actual)]
    PayloadTooLong {
        /// The maximum payload length.
        max: u8,

        /// The actual length of the payload that was provided.
        actual: usize,
    },
}

/// The number identifying one station on the bus.
///
/// # Examples
///
/// ```
/// use icsc_core::{Address, Command, Frame, Payload};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// #
/// // Create a frame from station 2 addressed to station 6.
/// let frame = Frame::new(Address(6), Address(2), Command(0x11), Payload::try_new(vec![1, 2])?);
/// #
/// # Ok(()) }
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, LowerHex, UpperHex)]
pub struct Address(pub u8);

impl Address {
    /// The broadcast destination, accepted by every station on the bus.
    pub const BROADCAST: Address = Address(0x00);

    /// Reserved for future multi-hop forwarding. Currently treated like any
    /// other destination; no station forwards on its behalf.
    pub const RELAY: Address = Address(0x09);
}

/// A [`Frame`]'s command code.
///
/// Carries no meaning of its own apart from the reserved identifiers below;
/// interpretation is up to the registered handlers.
///
/// # Examples
///
/// ```
/// use icsc_core::{Address, Command, Frame, Payload};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// #
/// let frame = Frame::new(Address(6), Address(2), Command(b'X'), Payload::try_new(vec![])?);
/// assert_eq!(Command(b'X'), frame.command());
/// #
/// # Ok(()) }
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, LowerHex, UpperHex)]
pub struct Command(pub u8);

impl Command {
    /// Liveness probe. Every station answers it with [`Command::PONG`]
    /// carrying the probe's payload, ahead of any user handler.
    pub const PING: Command = Command(0x05);

    /// Reply to [`Command::PING`].
    pub const PONG: Command = Command(0x06);

    /// Reserved: query a station's status. No built-in behavior.
    pub const QUERY_STATUS: Command = Command(0x07);

    /// Reserved: report a station's status. No built-in behavior.
    pub const REPORT_STATUS: Command = Command(0x08);

    /// Reserved: relay a frame through another station. No built-in behavior.
    pub const RELAY: Command = Command(0x09);

    /// Registration-only identifier matching every inbound command.
    ///
    /// Never sent over the wire as an actual command.
    pub const CATCH_ALL: Command = Command(0xFF);
}

/// A single message on the bus.
///
/// This struct handles converting a message into its wire format, dealing with
/// the checksum, and so forth. It makes no attempt to ascribe meaning to the
/// command code or payload.
///
/// Both owned and borrowed payloads are supported.
///
/// # Examples
///
/// ```
/// use icsc_core::{Address, Command, Frame, Payload};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// #
/// let frame = Frame::new(Address(6), Address(2), Command(0x11), Payload::try_new(vec![3, 31])?);
/// let bytes = frame.to_bytes();
/// assert_eq!(
///     &[0x01, 0x06, 0x02, 0x11, 0x02, 0x02, 0x03, 0x1F, 0x03, 0x3D, 0x04],
///     bytes.as_slice()
/// );
/// #
/// # Ok(()) }
/// ```
///
/// # Format Details
///
/// ```text
/// ┌─────────┬──────┬─────┬─────┬─────┬─────┬───────────┬ ┄ ┬─────┬────────┬─────┐
/// │ SOH × N │ Dest │ Src │ Cmd │ Len │ STX │ Payload 0 │...│ ETX │ Chksum │ EOT │
/// └─────────┴──────┴─────┴─────┴─────┴─────┴───────────┴ ┄ ┴─────┴────────┴─────┘
///                                          └╌╌ Len payload bytes ╌╌┘
/// ```
///
/// All fields are single bytes. `Len` can therefore not exceed 255, and `Chksum`
/// is the wrapping 8-bit sum of `Dest`, `Src`, `Cmd`, `Len`, and every payload
/// byte; the sentinels are not included. `N` is normally 1 but transmitters can
/// repeat the leading sentinel for receivers that drop the first byte after a
/// line turnaround (see [`DEFAULT_SOH_REPEAT`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame<'a> {
    destination: Address,
    source: Address,
    command: Command,
    payload: Payload<'a>,
}

impl<'a> Frame<'a> {
    /// Constructs a new `Frame` with the specified stations, command, and payload.
    ///
    /// # Examples
    ///
    /// ```
    /// # use icsc_core::{Address, Command, Frame, Payload};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// #
    /// // some_data is moved into owning_frame.
    /// let some_data = vec![1, 2, 3];
    /// let owning_frame = Frame::new(Address(6), Address(2), Command(0x0B), Payload::try_new(some_data)?);
    ///
    /// // other_data is borrowed.
    /// let other_data = vec![1, 2, 3];
    /// let borrowing_frame = Frame::new(Address(6), Address(2), Command(0x0C), Payload::try_new(other_data.as_slice())?);
    /// #
    /// # Ok(()) }
    /// ```
    pub fn new(destination: Address, source: Address, command: Command, payload: Payload<'a>) -> Self {
        Frame {
            destination,
            source,
            command,
            payload,
        }
    }

    /// Returns the station the frame is addressed to.
    pub fn destination(&self) -> Address {
        self.destination
    }

    /// Returns the station the frame was sent from.
    pub fn source(&self) -> Address {
        self.source
    }

    /// Returns the frame's command code.
    pub fn command(&self) -> Command {
        self.command
    }

    /// Returns the frame's payload bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// # use icsc_core::{Address, Command, Frame, Payload};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// #
    /// let frame = Frame::new(Address(6), Address(2), Command(0x11), Payload::try_new(vec![10, 20])?);
    /// assert_eq!(&[10, 20], frame.payload());
    /// #
    /// # Ok(()) }
    /// ```
    pub fn payload(&self) -> &[u8] {
        &self.payload.0
    }

    /// Consumes the frame and returns ownership of its payload.
    pub fn into_payload(self) -> Payload<'a> {
        self.payload
    }

    /// Converts the frame to its wire format with a single leading [`SOH`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use icsc_core::{Address, Command, Frame, Payload};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// #
    /// let frame = Frame::new(Address(9), Address(1), Command(0x05), Payload::try_new(vec![])?);
    /// assert_eq!(&[0x01, 0x09, 0x01, 0x05, 0x00, 0x02, 0x03, 0x0F, 0x04], frame.to_bytes().as_slice());
    /// #
    /// # Ok(()) }
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_bytes_with_preamble(DEFAULT_SOH_REPEAT)
    }

    /// Converts the frame to its wire format, repeating the leading [`SOH`]
    /// sentinel `soh_repeat` times.
    ///
    /// A count of zero is treated as one; a frame without its sentinel could
    /// never be recognized on the receiving side.
    pub fn to_bytes_with_preamble(&self, soh_repeat: usize) -> Vec<u8> {
        let soh_repeat = soh_repeat.max(1);
        let payload = &self.payload.0;

        // Preamble, 4 header bytes, STX, payload, ETX, checksum, EOT.
        let mut output = Vec::<u8>::with_capacity(soh_repeat + payload.len() + 8);
        output.resize(soh_repeat, SOH);
        output.push(self.destination.0);
        output.push(self.source.0);
        output.push(self.command.0);
        output.push(payload.len() as u8);
        output.push(STX);
        output.extend_from_slice(payload);
        output.push(ETX);
        output.push(self.checksum());
        output.push(EOT);
        assert_eq!(output.len(), output.capacity());
        output
    }

    /// Computes the wrapping 8-bit sum of the checksummed fields.
    fn checksum(&self) -> u8 {
        let header = self
            .destination
            .0
            .wrapping_add(self.source.0)
            .wrapping_add(self.command.0)
            .wrapping_add(self.payload.0.len() as u8);
        self.payload.0.iter().fold(header, |acc, &b| acc.wrapping_add(b))
    }
}

impl Display for Frame<'_> {
    /// Formats the frame in a human-readable way.
    ///
    /// Useful for viewing traffic on a bus. All numbers are in hex.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cmd {:02X} | From {:02X} | To {:02X}",
            self.command.0, self.source.0, self.destination.0
        )?;
        if !self.payload.0.is_empty() {
            write!(f, " | Data ")?;
            for byte in self.payload.0.iter() {
                write!(f, "{:02X} ", byte)?;
            }
        }
        Ok(())
    }
}

/// Owned or borrowed payload to be placed in a [`Frame`].
///
/// Since the payload length on the wire is a single byte, it cannot exceed
/// 255. `Payload` is responsible for maintaining this invariant: oversized
/// data is rejected outright rather than truncated.
///
/// # Examples
///
/// ```
/// use icsc_core::{Address, Command, Frame, Payload};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// #
/// let payload = Payload::try_new(vec![1, 2, 3])?; // Ok since length under 255
/// let frame = Frame::new(Address(6), Address(2), Command(0x11), payload);
/// #
/// # Ok(()) }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Payload<'a>(Cow<'a, [u8]>);

impl<'a> Payload<'a> {
    /// Creates a new `Payload` containing owned or borrowed data.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::PayloadTooLong`] if the data length is greater
    /// than 255 (`0xFF`).
    ///
    /// # Examples
    ///
    /// ```
    /// use icsc_core::Payload;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// #
    /// let payload = Payload::try_new(vec![1, 2, 3])?;
    /// assert_eq!(vec![1, 2, 3], payload.get().as_ref());
    /// #
    /// # Ok(()) }
    /// ```
    ///
    /// This will fail since the passed-in vector is too large:
    ///
    /// ```
    /// # use icsc_core::Payload;
    /// let result = Payload::try_new(vec![0; 1000]);
    /// assert!(result.is_err());
    /// ```
    pub fn try_new<T: Into<Cow<'a, [u8]>>>(data: T) -> Result<Self, FrameError> {
        let data: Cow<'a, [u8]> = data.into();
        if data.len() > 0xFF {
            return Err(FrameError::PayloadTooLong {
                max: 0xFF,
                actual: data.len(),
            });
        }
        Ok(Payload(data))
    }

    /// Returns a reference to the inner [`Cow`]`<[u8]>`.
    ///
    /// [`Cow`]: std::borrow::Cow
    pub fn get(&self) -> &Cow<'a, [u8]> {
        &self.0
    }
}

// Payloads are often built from small static arrays that obviously fit in the
// 255-byte limit, so create some From impls that make that case simple. We
// unfortunately can't be generic over integers yet, so use a macro to
// implement for common array lengths.
macro_rules! impl_from_array_ref_with_length {
    ($length:expr) => {
        impl From<&'static [u8; $length]> for Payload<'_> {
            fn from(value: &'static [u8; $length]) -> Payload<'_> {
                Payload::try_new(&value[..]).unwrap()
            }
        }
    };
}

impl_from_array_ref_with_length!(0);
impl_from_array_ref_with_length!(1);
impl_from_array_ref_with_length!(2);
impl_from_array_ref_with_length!(3);
impl_from_array_ref_with_length!(4);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_simple_frame() {
        let frame = Frame::new(Address(0x64), Address(0x32), Command(b'X'), Payload::from(&[1, 2, 3]));

        let expected = [
            SOH, 0x64, 0x32, b'X', 0x03, STX, 0x01, 0x02, 0x03, ETX, 0xF7, EOT,
        ];
        assert_eq!(&expected[..], frame.to_bytes().as_slice());
    }

    #[test]
    fn encodes_empty_payload() {
        let frame = Frame::new(Address(0x09), Address(0x01), Command(0x05), Payload::from(&[]));
        assert_eq!(
            &[SOH, 0x09, 0x01, 0x05, 0x00, STX, ETX, 0x0F, EOT],
            frame.to_bytes().as_slice()
        );
    }

    #[test]
    fn checksum_wraps_around() {
        let frame = Frame::new(Address(0xFF), Address(0xFE), Command(0xFD), Payload::from(&[0xFC]));
        // 0xFF + 0xFE + 0xFD + 0x01 + 0xFC == 0x3F7, truncated to 0xF7.
        let bytes = frame.to_bytes();
        assert_eq!(0xF7, bytes[bytes.len() - 2]);
    }

    #[test]
    fn preamble_repeats_soh() {
        let frame = Frame::new(Address(0x64), Address(0x32), Command(b'X'), Payload::from(&[]));
        let bytes = frame.to_bytes_with_preamble(3);
        assert_eq!(&[SOH, SOH, SOH, 0x64], &bytes[..4]);
    }

    #[test]
    fn zero_preamble_still_writes_one_soh() {
        let frame = Frame::new(Address(0x64), Address(0x32), Command(b'X'), Payload::from(&[]));
        assert_eq!(frame.to_bytes(), frame.to_bytes_with_preamble(0));
    }

    #[test]
    fn payload_length_over_255_rejected() {
        let error = Payload::try_new(vec![0; 256]).unwrap_err();
        assert!(matches!(error, FrameError::PayloadTooLong { max: 255, actual: 256, .. }));
    }

    #[test]
    fn getters() {
        let frame = Frame::new(Address(0x64), Address(0x32), Command(b'X'), Payload::from(&[0xFF]));
        assert_eq!(Address(0x64), frame.destination());
        assert_eq!(Address(0x32), frame.source());
        assert_eq!(Command(b'X'), frame.command());
        assert_eq!(&[0xFF], frame.payload());
    }

    #[test]
    fn display() {
        let frame = Frame::new(Address(0x64), Address(0x32), Command(0x02), Payload::from(&[0xFF, 0xCB]));
        let display = format!("{}", frame);
        assert_eq!("Cmd 02 | From 32 | To 64 | Data FF CB", display.trim());
    }
}
