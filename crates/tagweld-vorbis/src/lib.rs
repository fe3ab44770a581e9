//! Vorbis layer for tagweld.
//!
//! The container crate ([`tagweld_ogg`]) only moves opaque packets around;
//! this crate knows what the first three packets of a Vorbis stream mean:
//!
//! - packet 0 — identification header: sample rate, channels, bitrates
//! - packet 1 — comment header: the vendor string and the tag dictionary
//! - packet 2 — setup header: codebooks, verified but never decoded
//!
//! [`VorbisFile`] glues the two layers together: decode the headers on
//! open, edit the comment dictionary in memory, and let the container crate
//! splice the re-encoded comment packet back into the file on save.

#![warn(missing_docs)]

pub mod comment;
pub mod error;
pub mod file;
pub mod identification;
pub mod properties;

pub use comment::VorbisComments;
pub use error::{Error, Result};
pub use file::VorbisFile;
pub use identification::Identification;
pub use properties::AudioProperties;

/// Packet type byte of the identification header.
pub const IDENTIFICATION_PACKET_TYPE: u8 = 0x01;
/// Packet type byte of the comment header.
pub const COMMENT_PACKET_TYPE: u8 = 0x03;
/// Packet type byte of the setup header.
pub const SETUP_PACKET_TYPE: u8 = 0x05;

/// The six magic bytes following the packet type in every Vorbis header.
pub const VORBIS_MAGIC: [u8; 6] = *b"vorbis";

/// Strip the `\x01vorbis`-style signature off a header packet.
pub(crate) fn strip_signature(packet: &[u8], packet_type: u8) -> Result<&[u8]> {
    if packet.len() < 7 {
        return Err(Error::TruncatedPacket {
            expected: 7,
            actual: packet.len(),
        });
    }
    if packet[0] != packet_type || packet[1..7] != VORBIS_MAGIC {
        return Err(Error::InvalidSignature {
            expected: packet_type,
            actual: packet[0],
        });
    }
    Ok(&packet[7..])
}

/// Bounds-checked reader over a header packet body.
pub(crate) struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.data.len() - self.pos < len {
            return Err(Error::TruncatedPacket {
                expected: self.pos + len,
                actual: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
