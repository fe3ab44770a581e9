//! Ogg bitstream surgery.
//!
//! This crate reads and rewrites logical packets inside an Ogg container
//! without touching the packets it is not asked to change. The hard part of
//! the format is the page/packet multiplexing layer: packets are split
//! across fixed-capacity pages, every page carries its own CRC-32, and pages
//! are numbered in a strict monotonic sequence per logical stream. Replacing
//! one packet whose size changes therefore forces a re-layout of every page
//! downstream of it, while the payload bytes of all other packets must come
//! out byte-identical.
//!
//! # Components
//!
//! - [`crc`]: the Ogg CRC-32 (polynomial `0x04C11DB7`, MSB-first, no
//!   reflection)
//! - [`page`]: page header parsing and serialization
//! - [`packet`]: pages ⟷ packets in both directions
//! - [`index`]: the single-scan container index built at open
//! - [`rewrite`]: downstream re-layout and the byte-range patch
//! - [`stream`]: the [`OggStream`] file handle tying it all together
//!
//! # Example
//!
//! ```no_run
//! use tagweld_ogg::OggStream;
//!
//! # fn main() -> tagweld_ogg::Result<()> {
//! let mut stream = OggStream::open("music.ogg")?;
//! let comment_packet = stream.packet_at(1)?;
//! // ... hand the bytes to a codec-specific layer, get replacement bytes ...
//! stream.replace_packet(1, &comment_packet)?;
//! # Ok(())
//! # }
//! ```
//!
//! Only a single logical bitstream is modeled. Pages carrying a foreign
//! stream serial are preserved byte-for-byte but never interpreted.

#![warn(missing_docs)]

pub mod crc;
pub mod error;
pub mod index;
pub mod packet;
pub mod page;
pub mod rewrite;
pub mod stream;

pub use error::{Error, Result};
pub use index::{ContainerIndex, ForeignRange, PacketLocation, PageInfo, Strictness};
pub use packet::{PageTemplate, Packets, packet_to_pages, pages_to_packets};
pub use page::{Page, PageHeader};
pub use rewrite::FilePatch;
pub use stream::OggStream;

/// The four bytes that open every Ogg page.
pub const OGG_CAPTURE_PATTERN: [u8; 4] = *b"OggS";
