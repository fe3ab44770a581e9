//! The Vorbis identification header: packet 0 of the stream.
//!
//! Wire layout after the `\x01vorbis` signature: vorbis version (u32 LE,
//! must be 0), channel count (u8), sample rate (u32 LE), maximum/nominal/
//! minimum bitrate (three i32 LE, 0 or −1 meaning unset), one byte packing
//! the two block-size exponents (low nibble first), and a framing byte with
//! bit 0 set. Always 30 bytes on the wire.

use tracing::trace;

use crate::{Error, IDENTIFICATION_PACKET_TYPE, Result, SliceReader, strip_signature};

/// Decoded identification header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    /// Vorbis version; 0 for every stream in existence.
    pub version: u32,
    /// Number of audio channels.
    pub channels: u8,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Maximum bitrate in bits per second; 0 or −1 when unset.
    pub bitrate_maximum: i32,
    /// Nominal bitrate in bits per second; 0 or −1 when unset.
    pub bitrate_nominal: i32,
    /// Minimum bitrate in bits per second; 0 or −1 when unset.
    pub bitrate_minimum: i32,
    /// Short block size in samples.
    pub blocksize_0: u32,
    /// Long block size in samples.
    pub blocksize_1: u32,
}

impl Identification {
    /// Decode an identification header packet.
    pub fn parse(packet: &[u8]) -> Result<Self> {
        let body = strip_signature(packet, IDENTIFICATION_PACKET_TYPE)?;
        let mut reader = SliceReader::new(body);

        let version = reader.read_u32()?;
        let channels = reader.read_u8()?;
        let sample_rate = reader.read_u32()?;
        let bitrate_maximum = reader.read_i32()?;
        let bitrate_nominal = reader.read_i32()?;
        let bitrate_minimum = reader.read_i32()?;

        let blocksizes = reader.read_u8()?;
        let blocksize_0 = 1u32 << (blocksizes & 0x0F);
        let blocksize_1 = 1u32 << (blocksizes >> 4);

        let framing = reader.read_u8()?;
        if framing & 0x01 == 0 {
            return Err(Error::MissingFramingBit);
        }

        trace!(channels, sample_rate, "parsed identification header");

        Ok(Self {
            version,
            channels,
            sample_rate,
            bitrate_maximum,
            bitrate_nominal,
            bitrate_minimum,
            blocksize_0,
            blocksize_1,
        })
    }
}
