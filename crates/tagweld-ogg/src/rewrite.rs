//! Downstream re-layout and the byte-range patch.
//!
//! Replacing a packet whose size changes shifts every later byte and
//! renumbers every later page, so the engine rewrites everything from the
//! first affected page to the end of the tracked stream rather than chasing
//! fine-grained dependencies. The rebuilt image is validated packet-by-packet
//! before a single byte is allowed near the file; on any mismatch the file
//! is left untouched.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::{debug, trace};

use crate::index::{ContainerIndex, Strictness};
use crate::packet::{PageTemplate, packet_to_pages};
use crate::{Error, Result};

/// A pending suffix replacement: everything from `offset` to the end of the
/// file is replaced by `bytes`, shrinking or growing the file as needed.
#[derive(Debug, Clone)]
pub struct FilePatch {
    /// File offset where the replacement begins.
    pub offset: u64,
    /// Replacement bytes, through the new end of file.
    pub bytes: Vec<u8>,
}

impl FilePatch {
    /// File length after the patch is applied.
    pub fn new_len(&self) -> u64 {
        self.offset + self.bytes.len() as u64
    }

    /// Apply the patch as a single write-then-truncate-or-extend, synced to
    /// durable storage.
    pub fn apply(&self, file: &mut File) -> Result<()> {
        file.seek(SeekFrom::Start(self.offset))?;
        file.write_all(&self.bytes)?;
        file.set_len(self.new_len())?;
        file.sync_all()?;
        Ok(())
    }
}

/// Compute the patch that substitutes `new_bytes` for packet `n`.
///
/// The rewrite window opens at the first affected page and runs to the end
/// of the tracked stream. If packet `n` shares its first page with the tail
/// of an earlier packet, the window widens back to the first packet that
/// starts on a page boundary, and those packets are re-laid on their
/// unchanged bytes too. Foreign-serial ranges inside the window are
/// appended verbatim after the rebuilt tail.
pub fn plan_replacement<R: Read + Seek>(
    index: &ContainerIndex,
    reader: &mut R,
    n: usize,
    new_bytes: &[u8],
) -> Result<FilePatch> {
    let count = index.packet_count();
    if n >= count {
        return Err(Error::PacketIndexOutOfRange { index: n, count });
    }
    let packets = index.packets();
    let pages = index.pages();

    // Widen to the first packet of the affected page run.
    let mut first = n;
    while first > 0 && packets[first].first_page == packets[first - 1].last_page {
        first -= 1;
    }

    let cut_page = packets[first].first_page;
    let cut_offset = pages[cut_page].offset;
    let base_sequence = pages[cut_page].header.sequence;
    let stream_bos = pages[cut_page].header.is_bos();
    let stream_eos = pages.last().is_some_and(|page| page.header.is_eos());

    trace!(
        packet = n,
        first_relaid = first,
        cut_page,
        cut_offset,
        "planning packet replacement"
    );

    // Gather every packet in the window: the substitution plus the unchanged
    // bytes of everything after (and, when widened, just before) it.
    let mut window: Vec<(Vec<u8>, i64)> = Vec::with_capacity(count - first);
    for i in first..count {
        let bytes = if i == n {
            new_bytes.to_vec()
        } else {
            index.read_packet(reader, i)?
        };
        window.push((bytes, packets[i].end_granule));
    }

    // Re-split with a single continuing sequence counter.
    let serial = index.serial().unwrap_or_default();
    let mut rebuilt = Vec::new();
    let mut sequence = base_sequence;
    let mut rebuilt_pages = 0usize;
    for (i, (bytes, granule)) in window.iter().enumerate() {
        let template = PageTemplate {
            serial,
            base_sequence: sequence,
            granule_position: *granule,
            bos: stream_bos && i == 0,
            eos: stream_eos && i + 1 == window.len(),
        };
        let split = packet_to_pages(bytes, &template);
        sequence += split.len() as u32;
        rebuilt_pages += split.len();
        for page in &split {
            rebuilt.extend_from_slice(&page.serialize());
        }
    }

    debug!(
        window = window.len(),
        rebuilt_pages,
        old_pages = pages.len() - cut_page,
        "rebuilt downstream layout"
    );

    // Foreign-serial runs at or after the cut move to the tail, order kept.
    let mut foreign_tail = Vec::new();
    for range in index.foreign_ranges() {
        if range.offset >= cut_offset {
            reader.seek(SeekFrom::Start(range.offset))?;
            let mut bytes = vec![0u8; range.len as usize];
            reader.read_exact(&mut bytes)?;
            foreign_tail.append(&mut bytes);
        }
    }

    // Assemble the would-be file image and validate it packet-for-packet
    // against the untouched sequence plus the one substitution.
    reader.seek(SeekFrom::Start(0))?;
    let mut image = vec![0u8; cut_offset as usize];
    reader.read_exact(&mut image)?;
    image.extend_from_slice(&rebuilt);
    image.extend_from_slice(&foreign_tail);

    validate_layout(
        index,
        reader,
        &image,
        ValidationPlan {
            substituted: n,
            new_bytes,
            cut_page,
            base_sequence,
        },
    )?;

    let mut bytes = rebuilt;
    bytes.extend_from_slice(&foreign_tail);
    Ok(FilePatch {
        offset: cut_offset,
        bytes,
    })
}

struct ValidationPlan<'a> {
    substituted: usize,
    new_bytes: &'a [u8],
    cut_page: usize,
    base_sequence: u32,
}

fn violation(reason: impl Into<String>) -> Error {
    Error::LayoutInvariantViolation {
        reason: reason.into(),
    }
}

fn validate_layout<R: Read + Seek>(
    original: &ContainerIndex,
    reader: &mut R,
    image: &[u8],
    plan: ValidationPlan<'_>,
) -> Result<()> {
    let mut cursor = std::io::Cursor::new(image);
    let rebuilt = ContainerIndex::scan(&mut cursor, Strictness::Verified)
        .map_err(|err| violation(format!("rebuilt stream does not parse: {err}")))?;

    if rebuilt.packet_count() != original.packet_count() {
        return Err(violation(format!(
            "packet count changed from {} to {}",
            original.packet_count(),
            rebuilt.packet_count()
        )));
    }

    // Sequence numbers must run gapless from the first affected page on.
    let mut expected_sequence = plan.base_sequence;
    for page in &rebuilt.pages()[plan.cut_page..] {
        if page.header.sequence != expected_sequence {
            return Err(violation(format!(
                "page sequence gap: expected {expected_sequence}, found {}",
                page.header.sequence
            )));
        }
        expected_sequence += 1;
    }

    for i in 0..original.packet_count() {
        let actual = rebuilt
            .read_packet(&mut cursor, i)
            .map_err(|err| violation(format!("packet {i} unreadable after rewrite: {err}")))?;
        let matches = if i == plan.substituted {
            actual == plan.new_bytes
        } else {
            let expected = original.read_packet(reader, i)?;
            actual == expected
        };
        if !matches {
            return Err(violation(format!("packet {i} content changed")));
        }
    }

    Ok(())
}
