//! The open-file handle: one owner, one index, atomic rewrites.
//!
//! An [`OggStream`] owns its file handle and container index exclusively.
//! Nothing here is safe to share across concurrent handles on the same
//! path; callers who need that must serialize access externally. A rewrite
//! either applies a fully-validated patch and rebuilds the index, or fails
//! leaving both the file and the index exactly as they were.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::index::{ContainerIndex, ForeignRange, PageInfo, Strictness};
use crate::rewrite::{FilePatch, plan_replacement};
use crate::Result;

/// An open Ogg file and its container index.
#[derive(Debug)]
pub struct OggStream {
    file: File,
    path: PathBuf,
    index: ContainerIndex,
    strictness: Strictness,
}

impl OggStream {
    /// Open `path` for reading and rewriting.
    ///
    /// The whole file is scanned once; any checksum mismatch is fatal, since
    /// the index must be a trustworthy base for rewrites.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;
        Self::from_file(file, path.as_ref().to_path_buf(), Strictness::Verified)
    }

    /// Open `path` read-only for inspection.
    ///
    /// Checksum mismatches are recorded per page instead of failing the
    /// open; unaffected pages and packets remain readable, the damaged ones
    /// report [`crate::Error::CorruptPage`] when materialized.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_file(file, path.as_ref().to_path_buf(), Strictness::Permissive)
    }

    fn from_file(mut file: File, path: PathBuf, strictness: Strictness) -> Result<Self> {
        let index = {
            let mut reader = BufReader::new(&mut file);
            ContainerIndex::scan(&mut reader, strictness)?
        };
        debug!(
            path = %path.display(),
            pages = index.page_count(),
            packets = index.packet_count(),
            "opened ogg stream"
        );
        Ok(Self {
            file,
            path,
            index,
            strictness,
        })
    }

    /// Path this stream was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of logical packets in the tracked stream.
    pub fn packet_count(&self) -> usize {
        self.index.packet_count()
    }

    /// Number of pages in the tracked stream.
    pub fn page_count(&self) -> usize {
        self.index.page_count()
    }

    /// Page metadata, in file order.
    pub fn pages(&self) -> &[PageInfo] {
        self.index.pages()
    }

    /// Recorded foreign-serial byte ranges.
    pub fn foreign_ranges(&self) -> &[ForeignRange] {
        self.index.foreign_ranges()
    }

    /// Serial number of the tracked stream.
    pub fn serial(&self) -> Option<u32> {
        self.index.serial()
    }

    /// Sequence number of the last page, for duration-style queries.
    pub fn last_page_sequence_number(&self) -> Option<u32> {
        self.index.last_page_sequence_number()
    }

    /// Granule position of the last page, for duration-style queries.
    pub fn last_page_granule_position(&self) -> Option<i64> {
        self.index.last_page_granule_position()
    }

    /// Total length in bytes of the underlying file.
    pub fn len(&mut self) -> Result<u64> {
        Ok(self.file.seek(SeekFrom::End(0))?)
    }

    /// Whether the file contains no pages at all.
    pub fn is_empty(&self) -> bool {
        self.index.page_count() == 0
    }

    /// Materialize packet `n`, reading only the pages that contain it.
    pub fn packet_at(&mut self, n: usize) -> Result<Vec<u8>> {
        self.index.read_packet(&mut self.file, n)
    }

    /// Compute the patch that would substitute `bytes` for packet `n`,
    /// without touching the file.
    pub fn replacement_patch(&mut self, n: usize, bytes: &[u8]) -> Result<FilePatch> {
        plan_replacement(&self.index, &mut self.file, n, bytes)
    }

    /// Replace packet `n` with `bytes`.
    ///
    /// The downstream page layout is recomputed, validated, applied as a
    /// single write-then-truncate-or-extend, and the index rebuilt. On any
    /// error before the write, the file and index are untouched. If the
    /// write itself fails the error is surfaced as-is; the handle should
    /// then be reopened, since the on-disk state is no longer known.
    pub fn replace_packet(&mut self, n: usize, bytes: &[u8]) -> Result<()> {
        let patch = plan_replacement(&self.index, &mut self.file, n, bytes)?;
        info!(
            packet = n,
            new_len = bytes.len(),
            patch_offset = patch.offset,
            patch_len = patch.bytes.len(),
            "applying packet replacement"
        );
        patch.apply(&mut self.file)?;

        let index = {
            let mut reader = BufReader::new(&mut self.file);
            ContainerIndex::scan(&mut reader, self.strictness)?
        };
        self.index = index;
        Ok(())
    }
}
