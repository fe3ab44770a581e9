//! Packet assembly: merging pages into logical packets and splitting a
//! packet back into pages.
//!
//! Packet boundaries exist only in the segment tables: a segment length of
//! 255 continues the current packet (possibly onto the next page), any value
//! 0–254 terminates it. There is no external length field to fall back on,
//! which also means a packet whose length is an exact multiple of 255 must
//! end with an explicit zero-length segment.

use tracing::trace;

use crate::page::{
    FLAG_BOS, FLAG_CONTINUED, FLAG_EOS, GRANULE_NONE, MAX_SEGMENTS, Page, PageHeader,
};
use crate::{Error, Result};

/// Layout parameters for re-splitting one packet into pages.
#[derive(Debug, Clone, Copy)]
pub struct PageTemplate {
    /// Stream serial number stamped on every produced page.
    pub serial: u32,
    /// Sequence number of the first produced page; later pages count up.
    pub base_sequence: u32,
    /// Granule position for the final page of the run. Earlier pages get
    /// [`GRANULE_NONE`] since no packet ends on them.
    pub granule_position: i64,
    /// Set the beginning-of-stream flag on the first produced page.
    pub bos: bool,
    /// Set the end-of-stream flag on the last produced page.
    pub eos: bool,
}

/// Split one packet into as many pages as its length requires.
///
/// Lacing: ⌊len/255⌋ segments of 255 plus one terminating segment of
/// `len mod 255` — for a zero-length packet that is a single zero-length
/// segment, and for an exact multiple of 255 the terminator itself is
/// zero-length (possibly landing alone on a continuation page). Segments
/// are packed up to [`MAX_SEGMENTS`] per page; every page after the first
/// carries the continued flag.
pub fn packet_to_pages(packet: &[u8], template: &PageTemplate) -> Vec<Page> {
    let full_segments = packet.len() / 255;
    let terminator = (packet.len() % 255) as u8;
    let lacing_len = full_segments + 1;
    let page_count = lacing_len.div_ceil(MAX_SEGMENTS);

    trace!(
        packet_len = packet.len(),
        page_count,
        base_sequence = template.base_sequence,
        "splitting packet into pages"
    );

    let mut pages = Vec::with_capacity(page_count);
    let mut emitted = 0usize;
    let mut consumed = 0usize;

    for page_idx in 0..page_count {
        let take = (lacing_len - emitted).min(MAX_SEGMENTS);
        let mut segment_table = Vec::with_capacity(take);
        let mut payload_len = 0usize;
        for i in 0..take {
            let value = if emitted + i < full_segments {
                255
            } else {
                terminator
            };
            segment_table.push(value);
            payload_len += usize::from(value);
        }
        emitted += take;

        let payload = packet[consumed..consumed + payload_len].to_vec();
        consumed += payload_len;

        let last = page_idx + 1 == page_count;
        let mut flags = 0u8;
        if page_idx > 0 {
            flags |= FLAG_CONTINUED;
        }
        if template.bos && page_idx == 0 {
            flags |= FLAG_BOS;
        }
        if template.eos && last {
            flags |= FLAG_EOS;
        }

        pages.push(Page {
            header: PageHeader {
                version: 0,
                flags,
                granule_position: if last {
                    template.granule_position
                } else {
                    GRANULE_NONE
                },
                serial: template.serial,
                sequence: template.base_sequence + page_idx as u32,
                checksum: 0,
                segment_table,
            },
            payload,
        });
    }

    pages
}

/// Lazy packet iterator over a run of pages from one logical stream.
///
/// Yields each packet's bytes in order; restartable by constructing a fresh
/// iterator, since every step is a pure function of position and the pages.
pub struct Packets<'a> {
    pages: &'a [Page],
    page: usize,
    segment: usize,
    offset: usize,
    pending: Vec<u8>,
    open: bool,
    failed: bool,
}

/// Iterate the logical packets spanning `pages`.
///
/// The pages must all belong to the same stream serial and be in sequence
/// order; foreign-serial pages are the caller's problem to filter out.
pub fn pages_to_packets(pages: &[Page]) -> Packets<'_> {
    Packets {
        pages,
        page: 0,
        segment: 0,
        offset: 0,
        pending: Vec::new(),
        open: false,
        failed: false,
    }
}

impl Packets<'_> {
    /// Drain the iterator into a vector, stopping at the first error.
    pub fn collect_all(self) -> Result<Vec<Vec<u8>>> {
        self.collect()
    }

    fn check_entry(&self, page: &Page) -> Result<()> {
        // A continued page needs an open packet run and vice versa.
        if page.header.is_continued() != self.open {
            return Err(Error::MalformedContinuation {
                page: page.header.sequence,
            });
        }
        Ok(())
    }
}

impl Iterator for Packets<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let Some(page) = self.pages.get(self.page) else {
                // End of pages with a packet still open: the stream promised
                // a continuation that never arrived.
                if self.open {
                    self.failed = true;
                    let sequence = self
                        .pages
                        .last()
                        .map_or(0, |page| page.header.sequence);
                    return Some(Err(Error::MalformedContinuation { page: sequence }));
                }
                return None;
            };

            if self.segment == 0 && self.offset == 0 {
                if let Err(err) = self.check_entry(page) {
                    self.failed = true;
                    return Some(Err(err));
                }
            }

            while self.segment < page.header.segment_table.len() {
                let len = usize::from(page.header.segment_table[self.segment]);
                self.pending
                    .extend_from_slice(&page.payload[self.offset..self.offset + len]);
                self.offset += len;
                self.segment += 1;

                if len < 255 {
                    self.open = false;
                    return Some(Ok(std::mem::take(&mut self.pending)));
                }
                self.open = true;
            }

            self.page += 1;
            self.segment = 0;
            self.offset = 0;
        }
    }
}
