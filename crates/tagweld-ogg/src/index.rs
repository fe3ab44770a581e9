//! The container index built by a single forward scan at open time.
//!
//! The index records where every page of the tracked stream lives and which
//! pages every logical packet touches, without holding packet payloads in
//! memory. Payload bytes are materialized on demand from the underlying
//! reader. Pages with a foreign stream serial are skipped but their byte
//! ranges are recorded so a rewrite can preserve them verbatim.

use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, trace, warn};

use crate::page::{Page, PageHeader};
use crate::{Error, OGG_CAPTURE_PATTERN, Result};

/// How much the scan trusts the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Checksum mismatches are fatal; the index is a trustworthy rewrite base.
    Verified,
    /// Checksum mismatches are recorded per page; reads of unaffected pages
    /// still work, but the failing pages cannot be materialized.
    Permissive,
}

/// Location and metadata of one page of the tracked stream.
#[derive(Debug, Clone)]
pub struct PageInfo {
    /// File offset of the page's capture pattern.
    pub offset: u64,
    /// Parsed header and segment table.
    pub header: PageHeader,
    /// File offset of the first payload byte.
    pub payload_offset: u64,
    /// Payload length in bytes.
    pub payload_len: u64,
    /// Whether the stored checksum matched when scanned.
    pub checksum_ok: bool,
}

/// One contiguous slice of a packet inside a single page's payload.
#[derive(Debug, Clone, Copy)]
pub struct PacketSpan {
    /// Index into the page list.
    pub page: usize,
    /// Offset within that page's payload.
    pub start: u64,
    /// Length of the slice.
    pub len: u64,
}

/// Where one logical packet lives.
#[derive(Debug, Clone)]
pub struct PacketLocation {
    /// Index of the first page carrying any of this packet's bytes.
    pub first_page: usize,
    /// Index of the page on which the packet ends.
    pub last_page: usize,
    /// Granule position of the page the packet ends on.
    pub end_granule: i64,
    /// Payload slices, in order. Empty for a zero-length packet.
    pub spans: Vec<PacketSpan>,
}

/// Byte range of a run of foreign-serial pages, preserved verbatim.
#[derive(Debug, Clone, Copy)]
pub struct ForeignRange {
    /// File offset where the run starts.
    pub offset: u64,
    /// Length of the run in bytes.
    pub len: u64,
}

/// In-memory map of one open Ogg file.
///
/// Built once per open handle; becomes stale after any structural rewrite
/// and must be rebuilt, never patched in place.
#[derive(Debug)]
pub struct ContainerIndex {
    serial: Option<u32>,
    pages: Vec<PageInfo>,
    packets: Vec<PacketLocation>,
    foreign: Vec<ForeignRange>,
    scan_end: u64,
}

impl ContainerIndex {
    /// Scan `reader` from byte 0 and build the index.
    ///
    /// The serial of the first page determines the tracked stream. The scan
    /// stops at a clean end of input; anything that ends mid-structure is
    /// reported as truncation.
    pub fn scan<R: Read + Seek>(reader: &mut R, strictness: Strictness) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;

        let mut serial = None;
        let mut pages = Vec::new();
        let mut packets = Vec::new();
        let mut foreign: Vec<ForeignRange> = Vec::new();
        let mut builder = PacketBuilder::default();

        loop {
            let offset = reader.stream_position()?;
            if at_end_of_input(reader)? {
                break;
            }
            reader.seek(SeekFrom::Start(offset))?;

            let page = Page::parse(reader)?;
            let tracked_serial = *serial.get_or_insert(page.header.serial);

            if page.header.serial != tracked_serial {
                let len = page.len() as u64;
                trace!(
                    offset,
                    serial = page.header.serial,
                    "skipping foreign-serial page"
                );
                match foreign.last_mut() {
                    Some(range) if range.offset + range.len == offset => range.len += len,
                    _ => foreign.push(ForeignRange { offset, len }),
                }
                continue;
            }

            let checksum_ok = match page.verify() {
                Ok(()) => true,
                Err(err) => {
                    if strictness == Strictness::Verified {
                        return Err(err);
                    }
                    warn!(
                        offset,
                        sequence = page.header.sequence,
                        "page failed checksum validation"
                    );
                    false
                }
            };

            let page_index = pages.len();
            builder.feed(&page.header, page_index, &mut packets)?;

            let payload_offset = offset + page.header.header_len() as u64;
            pages.push(PageInfo {
                offset,
                header: page.header,
                payload_offset,
                payload_len: page.payload.len() as u64,
                checksum_ok,
            });
        }

        builder.finish(&pages)?;
        let scan_end = reader.stream_position()?;

        debug!(
            pages = pages.len(),
            packets = packets.len(),
            foreign_ranges = foreign.len(),
            "container index built"
        );

        Ok(Self {
            serial,
            pages,
            packets,
            foreign,
            scan_end,
        })
    }

    /// Serial number of the tracked stream, if any page was found.
    pub fn serial(&self) -> Option<u32> {
        self.serial
    }

    /// Pages of the tracked stream, in file order.
    pub fn pages(&self) -> &[PageInfo] {
        &self.pages
    }

    /// Packet locations, in stream order.
    pub fn packets(&self) -> &[PacketLocation] {
        &self.packets
    }

    /// Recorded foreign-serial byte ranges, in file order.
    pub fn foreign_ranges(&self) -> &[ForeignRange] {
        &self.foreign
    }

    /// Number of logical packets in the tracked stream.
    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    /// Number of pages in the tracked stream.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Offset one past the last scanned byte.
    pub fn scan_end(&self) -> u64 {
        self.scan_end
    }

    /// Sequence number of the last tracked page.
    pub fn last_page_sequence_number(&self) -> Option<u32> {
        self.pages.last().map(|page| page.header.sequence)
    }

    /// Granule position of the last tracked page.
    pub fn last_page_granule_position(&self) -> Option<i64> {
        self.pages.last().map(|page| page.header.granule_position)
    }

    /// Materialize packet `n` by reading only the pages that contain it.
    ///
    /// Fails with [`Error::CorruptPage`] if any containing page failed
    /// checksum validation during a permissive scan.
    pub fn read_packet<R: Read + Seek>(&self, reader: &mut R, n: usize) -> Result<Vec<u8>> {
        let location = self
            .packets
            .get(n)
            .ok_or(Error::PacketIndexOutOfRange {
                index: n,
                count: self.packets.len(),
            })?;

        let total: u64 = location.spans.iter().map(|span| span.len).sum();
        let mut bytes = Vec::with_capacity(total as usize);
        for span in &location.spans {
            let page = &self.pages[span.page];
            if !page.checksum_ok {
                let computed = self.recompute_checksum(reader, page)?;
                return Err(Error::CorruptPage {
                    page: page.header.sequence,
                    expected: page.header.checksum,
                    actual: computed,
                });
            }
            reader.seek(SeekFrom::Start(page.payload_offset + span.start))?;
            let mut chunk = vec![0u8; span.len as usize];
            reader.read_exact(&mut chunk)?;
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    fn recompute_checksum<R: Read + Seek>(&self, reader: &mut R, page: &PageInfo) -> Result<u32> {
        reader.seek(SeekFrom::Start(page.offset))?;
        let page = Page::parse(reader)?;
        Ok(page.computed_checksum())
    }
}

/// Incremental packet-boundary tracker fed one header at a time.
#[derive(Debug, Default)]
struct PacketBuilder {
    current: Option<PacketLocation>,
    open: bool,
}

impl PacketBuilder {
    fn feed(
        &mut self,
        header: &PageHeader,
        page_index: usize,
        packets: &mut Vec<PacketLocation>,
    ) -> Result<()> {
        if header.is_continued() != self.open {
            return Err(Error::MalformedContinuation {
                page: header.sequence,
            });
        }

        let mut offset = 0u64;
        for &len in &header.segment_table {
            let len = u64::from(len);
            let location = self.current.get_or_insert_with(|| PacketLocation {
                first_page: page_index,
                last_page: page_index,
                end_granule: 0,
                spans: Vec::new(),
            });

            if len > 0 {
                match location.spans.last_mut() {
                    Some(span) if span.page == page_index && span.start + span.len == offset => {
                        span.len += len;
                    }
                    _ => location.spans.push(PacketSpan {
                        page: page_index,
                        start: offset,
                        len,
                    }),
                }
            }
            offset += len;

            if len < 255 {
                let mut finished = self.current.take().unwrap_or_else(|| PacketLocation {
                    first_page: page_index,
                    last_page: page_index,
                    end_granule: 0,
                    spans: Vec::new(),
                });
                finished.last_page = page_index;
                finished.end_granule = header.granule_position;
                packets.push(finished);
                self.open = false;
            } else {
                self.open = true;
            }
        }

        Ok(())
    }

    fn finish(self, pages: &[PageInfo]) -> Result<()> {
        if self.open {
            let sequence = pages.last().map_or(0, |page| page.header.sequence);
            return Err(Error::MalformedContinuation { page: sequence });
        }
        Ok(())
    }
}

/// Probe whether the reader is at a clean end of input.
fn at_end_of_input<R: Read>(reader: &mut R) -> Result<bool> {
    let mut probe = [0u8; 1];
    loop {
        match reader.read(&mut probe) {
            Ok(0) => return Ok(true),
            Ok(_) => return Ok(false),
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
}
