//! Ogg page parsing and serialization.
//!
//! A page is the physical unit of the bitstream: a 27-byte fixed header, a
//! segment table of up to 255 single-byte lengths, and the payload whose
//! length is the sum of the table entries. Serialization always recomputes
//! the checksum; the stored value is only ever trusted by [`Page::verify`].

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;
use tracing::trace;

use crate::crc::Crc32;
use crate::{Error, OGG_CAPTURE_PATTERN, Result};

/// Size of the fixed page header, before the segment table.
pub const FIXED_HEADER_SIZE: usize = 27;

/// Maximum number of segments a single page can carry.
pub const MAX_SEGMENTS: usize = 255;

/// Maximum payload bytes per page (255 segments of 255 bytes each).
pub const MAX_PAGE_PAYLOAD: usize = MAX_SEGMENTS * 255;

/// Flag bit: the page starts with the continuation of an earlier packet.
pub const FLAG_CONTINUED: u8 = 0x01;
/// Flag bit: first page of the logical bitstream.
pub const FLAG_BOS: u8 = 0x02;
/// Flag bit: last page of the logical bitstream.
pub const FLAG_EOS: u8 = 0x04;

/// Granule position of a page on which no packet ends.
pub const GRANULE_NONE: i64 = -1;

/// Parsed Ogg page header plus segment table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    /// Stream structure version; only 0 exists.
    pub version: u8,
    /// Header type flags ([`FLAG_CONTINUED`], [`FLAG_BOS`], [`FLAG_EOS`]).
    pub flags: u8,
    /// Codec-defined 64-bit timestamp; −1 when no packet ends on this page.
    pub granule_position: i64,
    /// Serial number of the logical bitstream this page belongs to.
    pub serial: u32,
    /// Page sequence number, monotonically increasing per serial.
    pub sequence: u32,
    /// Checksum as stored on disk. Ignored on serialization.
    pub checksum: u32,
    /// Ordered segment lengths; an entry of 255 continues the packet.
    pub segment_table: Vec<u8>,
}

impl PageHeader {
    /// Parse a page header from the reader's current position.
    ///
    /// Consumes exactly the fixed header and the segment table, leaving the
    /// reader at the first payload byte.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut fixed = [0u8; FIXED_HEADER_SIZE];
        read_exact_at(reader, &mut fixed, FIXED_HEADER_SIZE as u64, 0)?;

        let mut capture = [0u8; 4];
        capture.copy_from_slice(&fixed[0..4]);
        if capture != OGG_CAPTURE_PATTERN {
            return Err(Error::InvalidCapturePattern(capture));
        }

        let version = fixed[4];
        if version != 0 {
            return Err(Error::UnsupportedVersion(version));
        }

        let flags = fixed[5];
        let mut rest = &fixed[6..26];
        let granule_position = rest.read_i64::<LittleEndian>()?;
        let serial = rest.read_u32::<LittleEndian>()?;
        let sequence = rest.read_u32::<LittleEndian>()?;
        let checksum = rest.read_u32::<LittleEndian>()?;
        let segment_count = fixed[26];

        let mut segment_table = vec![0u8; segment_count as usize];
        read_exact_at(
            reader,
            &mut segment_table,
            FIXED_HEADER_SIZE as u64 + u64::from(segment_count),
            FIXED_HEADER_SIZE as u64,
        )?;

        trace!(sequence, segment_count, "parsed page header");

        Ok(Self {
            version,
            flags,
            granule_position,
            serial,
            sequence,
            checksum,
            segment_table,
        })
    }

    /// Total payload bytes this header declares.
    pub fn payload_len(&self) -> usize {
        self.segment_table.iter().map(|&len| usize::from(len)).sum()
    }

    /// On-disk size of the header itself (fixed part + segment table).
    pub fn header_len(&self) -> usize {
        FIXED_HEADER_SIZE + self.segment_table.len()
    }

    /// Whether the page starts mid-packet.
    pub fn is_continued(&self) -> bool {
        self.flags & FLAG_CONTINUED != 0
    }

    /// Whether this is the first page of the logical bitstream.
    pub fn is_bos(&self) -> bool {
        self.flags & FLAG_BOS != 0
    }

    /// Whether this is the last page of the logical bitstream.
    pub fn is_eos(&self) -> bool {
        self.flags & FLAG_EOS != 0
    }

    /// Whether the last segment leaves the packet unterminated, so the next
    /// page of this stream must continue it.
    pub fn ends_open(&self) -> bool {
        self.segment_table.last().copied() == Some(255)
    }

    fn write_into(&self, out: &mut Vec<u8>, checksum: u32) {
        debug_assert!(self.segment_table.len() <= MAX_SEGMENTS);
        out.extend_from_slice(&OGG_CAPTURE_PATTERN);
        out.push(self.version);
        out.push(self.flags);
        out.extend_from_slice(&self.granule_position.to_le_bytes());
        out.extend_from_slice(&self.serial.to_le_bytes());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.extend_from_slice(&checksum.to_le_bytes());
        out.push(self.segment_table.len() as u8);
        out.extend_from_slice(&self.segment_table);
    }
}

/// A page header together with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Header and segment table.
    pub header: PageHeader,
    /// Payload bytes; length equals the segment table total.
    pub payload: Vec<u8>,
}

impl Page {
    /// Parse a full page (header, segment table, payload) from the reader.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let header = PageHeader::parse(reader)?;
        let header_len = header.header_len() as u64;
        let payload_len = header.payload_len();

        let mut payload = vec![0u8; payload_len];
        read_exact_at(
            reader,
            &mut payload,
            header_len + payload_len as u64,
            header_len,
        )?;

        Ok(Self { header, payload })
    }

    /// Serialize the page, recomputing the checksum.
    pub fn serialize(&self) -> Vec<u8> {
        debug_assert_eq!(self.header.payload_len(), self.payload.len());
        let mut out = Vec::with_capacity(self.len());
        self.header.write_into(&mut out, 0);
        out.extend_from_slice(&self.payload);

        let mut crc = Crc32::new();
        crc.update(&out);
        let checksum = crc.finalize();
        out[22..26].copy_from_slice(&checksum.to_le_bytes());
        out
    }

    /// Checksum of this page as it would be written.
    pub fn computed_checksum(&self) -> u32 {
        let mut bytes = Vec::with_capacity(self.len());
        self.header.write_into(&mut bytes, 0);
        bytes.extend_from_slice(&self.payload);
        let mut crc = Crc32::new();
        crc.update(&bytes);
        crc.finalize()
    }

    /// Compare the stored checksum against a fresh computation.
    pub fn verify(&self) -> Result<()> {
        let computed = self.computed_checksum();
        if computed == self.header.checksum {
            Ok(())
        } else {
            Err(Error::CorruptPage {
                page: self.header.sequence,
                expected: self.header.checksum,
                actual: computed,
            })
        }
    }

    /// Total on-disk size of the page.
    pub fn len(&self) -> usize {
        self.header.header_len() + self.payload.len()
    }

    /// Whether the page is completely empty (no segments, no payload).
    pub fn is_empty(&self) -> bool {
        self.header.segment_table.is_empty()
    }
}

/// Read exactly `buf.len()` bytes. A short read reports the full structure
/// size `expected` against the `offset` + bytes actually available.
fn read_exact_at<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    expected: u64,
    offset: u64,
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(Error::TruncatedHeader {
                expected,
                actual: offset + filled as u64,
            });
        }
        filled += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    // BOS page, serial 0x12345678, sequence 0, granule 0, payload "hello world"
    const SAMPLE_PAGE: [u8; 39] = [
        0x4F, 0x67, 0x67, 0x53, // OggS
        0x00, 0x02, // version, flags (BOS)
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // granule 0
        0x78, 0x56, 0x34, 0x12, // serial
        0x00, 0x00, 0x00, 0x00, // sequence
        0xF1, 0x78, 0x75, 0x14, // checksum 0x147578F1
        0x01, 0x0B, // 1 segment of 11 bytes
        b'h', b'e', b'l', b'l', b'o', b' ', b'w', b'o', b'r', b'l', b'd',
    ];

    #[test]
    fn parse_sample_page() {
        let page = Page::parse(&mut Cursor::new(&SAMPLE_PAGE)).unwrap();
        assert_eq!(page.header.version, 0);
        assert!(page.header.is_bos());
        assert!(!page.header.is_continued());
        assert!(!page.header.is_eos());
        assert_eq!(page.header.granule_position, 0);
        assert_eq!(page.header.serial, 0x1234_5678);
        assert_eq!(page.header.sequence, 0);
        assert_eq!(page.header.checksum, 0x1475_78F1);
        assert_eq!(page.header.segment_table, vec![11]);
        assert_eq!(page.payload, b"hello world");
        page.verify().unwrap();
    }

    #[test]
    fn serialize_round_trips() {
        let page = Page::parse(&mut Cursor::new(&SAMPLE_PAGE)).unwrap();
        assert_eq!(page.serialize(), SAMPLE_PAGE.to_vec());
    }

    #[test]
    fn serialize_recomputes_checksum() {
        let mut page = Page::parse(&mut Cursor::new(&SAMPLE_PAGE)).unwrap();
        page.header.checksum = 0xDEAD_BEEF;
        // The stale stored value must not leak into the output.
        assert_eq!(page.serialize(), SAMPLE_PAGE.to_vec());
    }

    #[test]
    fn empty_segment_table_is_legal() {
        // EOS marker page with no payload: granule 7077888, sequence 5.
        let page = Page {
            header: PageHeader {
                version: 0,
                flags: FLAG_EOS,
                granule_position: 7_077_888,
                serial: 0x1234_5678,
                sequence: 5,
                checksum: 0,
                segment_table: Vec::new(),
            },
            payload: Vec::new(),
        };
        let bytes = page.serialize();
        assert_eq!(bytes.len(), FIXED_HEADER_SIZE);

        let reparsed = Page::parse(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(reparsed.header.checksum, 0x38E5_D783);
        reparsed.verify().unwrap();
        assert!(reparsed.is_empty());
        assert!(reparsed.header.is_eos());
    }

    #[test]
    fn invalid_capture_pattern() {
        let mut bytes = SAMPLE_PAGE.to_vec();
        bytes[0] = b'X';
        let err = Page::parse(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, Error::InvalidCapturePattern(_)));
    }

    #[test]
    fn unsupported_version() {
        let mut bytes = SAMPLE_PAGE.to_vec();
        bytes[4] = 1;
        let err = Page::parse(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(1)));
    }

    #[test]
    fn truncated_fixed_header() {
        let err = Page::parse(&mut Cursor::new(&SAMPLE_PAGE[..20])).unwrap_err();
        assert!(
            matches!(
                err,
                Error::TruncatedHeader {
                    expected: 27,
                    actual: 20,
                }
            ),
            "actual error: {err:?}",
        );
    }

    #[test]
    fn truncated_segment_table() {
        // Claim 4 segments but provide none.
        let mut bytes = SAMPLE_PAGE[..27].to_vec();
        bytes[26] = 4;
        let err = Page::parse(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(
            matches!(
                err,
                Error::TruncatedHeader {
                    expected: 31,
                    actual: 27,
                }
            ),
            "actual error: {err:?}",
        );
    }

    #[test]
    fn truncated_payload() {
        let err = Page::parse(&mut Cursor::new(&SAMPLE_PAGE[..32])).unwrap_err();
        assert!(
            matches!(
                err,
                Error::TruncatedHeader {
                    expected: 39,
                    actual: 32,
                }
            ),
            "actual error: {err:?}",
        );
    }

    #[test]
    fn corrupt_payload_detected() {
        let mut bytes = SAMPLE_PAGE.to_vec();
        *bytes.last_mut().unwrap() ^= 0x01;
        let page = Page::parse(&mut Cursor::new(&bytes)).unwrap();
        let err = page.verify().unwrap_err();
        assert!(matches!(
            err,
            Error::CorruptPage {
                page: 0,
                expected: 0x1475_78F1,
                ..
            }
        ));
    }

    #[test]
    fn ends_open_tracks_last_segment() {
        let mut header = PageHeader {
            version: 0,
            flags: 0,
            granule_position: GRANULE_NONE,
            serial: 1,
            sequence: 0,
            checksum: 0,
            segment_table: vec![255, 255, 10],
        };
        assert!(!header.ends_open());
        header.segment_table = vec![255, 255];
        assert!(header.ends_open());
        assert_eq!(header.payload_len(), 510);
    }
}
