//! The file facade: header decoding on open, tag edits in memory, container
//! surgery on save.

use std::path::Path;
use tracing::{debug, info};

use tagweld_ogg::OggStream;

use crate::{
    AudioProperties, Error, Identification, Result, SETUP_PACKET_TYPE, VorbisComments,
    strip_signature,
};

/// Ordinal of the comment header packet in a Vorbis stream.
const COMMENT_PACKET: usize = 1;

/// An open Vorbis file: decoded headers plus the underlying Ogg stream.
///
/// Opening decodes the identification and comment headers and verifies the
/// setup header's signature; the audio packets are never touched. Edits to
/// [`comments_mut`](Self::comments_mut) live in memory until
/// [`save`](Self::save) re-encodes the comment packet and splices it back
/// into the file.
#[derive(Debug)]
pub struct VorbisFile {
    stream: OggStream,
    identification: Identification,
    comments: VorbisComments,
    properties: AudioProperties,
}

impl VorbisFile {
    /// Open `path` and decode the three mandatory header packets.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut stream = OggStream::open(path)?;
        if stream.packet_count() < 3 {
            return Err(Error::MissingHeaders(stream.packet_count()));
        }

        let identification = Identification::parse(&stream.packet_at(0)?)?;
        let comments = VorbisComments::parse(&stream.packet_at(COMMENT_PACKET)?)?;
        strip_signature(&stream.packet_at(2)?, SETUP_PACKET_TYPE)?;

        let stream_len = stream.len()?;
        let properties = AudioProperties::compute(
            &identification,
            stream.last_page_granule_position(),
            stream_len,
        );

        debug!(
            path = %stream.path().display(),
            sample_rate = identification.sample_rate,
            channels = identification.channels,
            fields = comments.field_count(),
            "opened vorbis file"
        );

        Ok(Self {
            stream,
            identification,
            comments,
            properties,
        })
    }

    /// Re-encode the comment packet and splice it into the file.
    ///
    /// All-or-nothing like the container layer underneath: on error the
    /// on-disk file is unchanged and the in-memory dictionary keeps its
    /// edits for a retry.
    pub fn save(&mut self) -> Result<()> {
        let packet = self.comments.build();
        info!(
            path = %self.stream.path().display(),
            packet_len = packet.len(),
            "saving comment header"
        );
        self.stream.replace_packet(COMMENT_PACKET, &packet)?;

        let stream_len = self.stream.len()?;
        self.properties = AudioProperties::compute(
            &self.identification,
            self.stream.last_page_granule_position(),
            stream_len,
        );
        Ok(())
    }

    /// The tag dictionary.
    pub fn comments(&self) -> &VorbisComments {
        &self.comments
    }

    /// The tag dictionary, for editing. Call [`save`](Self::save) to persist.
    pub fn comments_mut(&mut self) -> &mut VorbisComments {
        &mut self.comments
    }

    /// The decoded identification header.
    pub fn identification(&self) -> &Identification {
        &self.identification
    }

    /// Duration, bitrate, and stream parameters.
    pub fn properties(&self) -> &AudioProperties {
        &self.properties
    }

    /// The underlying container stream.
    pub fn stream(&self) -> &OggStream {
        &self.stream
    }

    /// The underlying container stream, for packet-level access.
    pub fn stream_mut(&mut self) -> &mut OggStream {
        &mut self.stream
    }

    /// First TITLE value, if any.
    pub fn title(&self) -> Option<&str> {
        self.comments.first("TITLE")
    }

    /// Replace the TITLE field with a single value.
    pub fn set_title(&mut self, title: impl Into<String>) -> Result<()> {
        self.comments.set("TITLE", title)
    }

    /// First ARTIST value, if any.
    pub fn artist(&self) -> Option<&str> {
        self.comments.first("ARTIST")
    }

    /// Replace the ARTIST field with a single value.
    pub fn set_artist(&mut self, artist: impl Into<String>) -> Result<()> {
        self.comments.set("ARTIST", artist)
    }

    /// First ALBUM value, if any.
    pub fn album(&self) -> Option<&str> {
        self.comments.first("ALBUM")
    }

    /// Replace the ALBUM field with a single value.
    pub fn set_album(&mut self, album: impl Into<String>) -> Result<()> {
        self.comments.set("ALBUM", album)
    }

    /// Remove every value under `name`. Returns whether anything was there.
    pub fn remove(&mut self, name: &str) -> bool {
        self.comments.remove(name)
    }
}
