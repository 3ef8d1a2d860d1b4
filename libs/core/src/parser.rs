use std::mem;

use log::debug;

use crate::frame::{Address, Command, Frame, Payload, EOT, ETX, SOH, STX};

/// Outcome of feeding one byte to a [`FrameParser`].
#[derive(Debug)]
pub enum Step {
    /// Nothing noteworthy happened; keep feeding bytes.
    Continue,

    /// A header addressed to this station was just recognized. The bytes that
    /// follow belong to the frame until it resolves one way or the other, so
    /// a driver sharing the line with transmitters should stop them now.
    HeaderFound,

    /// The in-progress frame failed trailer validation and was discarded.
    ///
    /// The parser is already hunting for the next header; corruption on a
    /// shared bus is routine and no error is surfaced.
    Rejected,

    /// A frame passed validation and is ready for dispatch.
    Complete(Frame<'static>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    SeekHeader,
    CollectPayload,
    CheckEtx,
    ReadChecksum,
    CheckEot,
}

/// Byte-at-a-time parser recovering frames for one station from a serial stream.
///
/// The parser hunts for a header by sliding every incoming byte through a
/// six-byte window. A header is recognized when the window reads
/// `[SOH, dest, src, cmd, len, STX]`, the destination and source differ, and
/// the destination is this station or [`Address::BROADCAST`]. Frames for other
/// stations never advance the parser, so their payloads cost nothing here.
///
/// After a recognized header the declared number of payload bytes is
/// collected, then the `ETX` / checksum / `EOT` trailer is validated. Any
/// mismatch silently discards the frame; the next valid header on the stream
/// re-synchronizes the parser. This makes it safe to feed arbitrary garbage,
/// partial frames, and line noise.
///
/// # Examples
///
/// ```
/// use icsc_core::{Address, Command, Frame, FrameParser, Payload, Step};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// #
/// let frame = Frame::new(Address(6), Address(2), Command(0x11), Payload::try_new(vec![3, 31])?);
///
/// let mut parser = FrameParser::new(Address(6));
/// let mut received = None;
/// for byte in frame.to_bytes() {
///     if let Step::Complete(complete) = parser.push(byte) {
///         received = Some(complete);
///     }
/// }
/// assert_eq!(Some(&frame), received.as_ref());
/// #
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct FrameParser {
    station: Address,
    phase: Phase,
    window: [u8; 6],
    destination: Address,
    source: Address,
    command: Command,
    expected: usize,
    checksum: u8,
    trailer: u8,
    buffer: Vec<u8>,
}

impl FrameParser {
    /// Creates a parser accepting frames addressed to `station` or broadcast.
    pub fn new(station: Address) -> Self {
        FrameParser {
            station,
            phase: Phase::SeekHeader,
            window: [0; 6],
            destination: Address(0),
            source: Address(0),
            command: Command(0),
            expected: 0,
            checksum: 0,
            trailer: 0,
            buffer: Vec::new(),
        }
    }

    /// Returns the station this parser accepts frames for.
    pub fn station(&self) -> Address {
        self.station
    }

    /// Advances the parser by one byte.
    pub fn push(&mut self, byte: u8) -> Step {
        match self.phase {
            Phase::SeekHeader => self.seek_header(byte),
            Phase::CollectPayload => {
                self.buffer.push(byte);
                self.checksum = self.checksum.wrapping_add(byte);
                if self.buffer.len() == self.expected {
                    self.phase = Phase::CheckEtx;
                }
                Step::Continue
            }
            Phase::CheckEtx => {
                if byte == ETX {
                    self.phase = Phase::ReadChecksum;
                    Step::Continue
                } else {
                    debug!(
                        "frame from {:02x} discarded: expected ETX, got {:#04x}",
                        self.source, byte
                    );
                    self.reset();
                    Step::Rejected
                }
            }
            Phase::ReadChecksum => {
                self.trailer = byte;
                self.phase = Phase::CheckEot;
                Step::Continue
            }
            Phase::CheckEot => {
                if byte == EOT && self.trailer == self.checksum {
                    let frame = self.take_frame();
                    self.reset();
                    Step::Complete(frame)
                } else {
                    if byte == EOT {
                        debug!(
                            "frame from {:02x} discarded: checksum {:#04x} didn't match trailer {:#04x}",
                            self.source, self.checksum, self.trailer
                        );
                    } else {
                        debug!(
                            "frame from {:02x} discarded: expected EOT, got {:#04x}",
                            self.source, byte
                        );
                    }
                    self.reset();
                    Step::Rejected
                }
            }
        }
    }

    fn seek_header(&mut self, byte: u8) -> Step {
        self.window.copy_within(1.., 0);
        self.window[5] = byte;

        let [soh, destination, source, command, length, stx] = self.window;
        if stx != STX || soh != SOH || destination == source {
            return Step::Continue;
        }
        if Address(destination) != self.station && Address(destination) != Address::BROADCAST {
            // Someone else's frame; keep sliding without claiming a buffer.
            return Step::Continue;
        }

        self.destination = Address(destination);
        self.source = Address(source);
        self.command = Command(command);
        self.expected = usize::from(length);
        self.checksum = destination
            .wrapping_add(source)
            .wrapping_add(command)
            .wrapping_add(length);
        self.buffer.clear();
        self.buffer.reserve(self.expected);
        self.phase = if self.expected > 0 {
            Phase::CollectPayload
        } else {
            Phase::CheckEtx
        };
        Step::HeaderFound
    }

    fn take_frame(&mut self) -> Frame<'static> {
        let data = mem::take(&mut self.buffer);
        // The buffer never outgrows the declared length, which fits in a byte,
        // so this can't fail.
        let payload = Payload::try_new(data).unwrap();
        Frame::new(self.destination, self.source, self.command, payload)
    }

    fn reset(&mut self) {
        self.phase = Phase::SeekHeader;
        self.window = [0; 6];
        self.expected = 0;
        self.checksum = 0;
        self.trailer = 0;
        self.buffer.clear();
    }
}
