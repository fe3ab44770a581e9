//! Audio properties derived from the identification header and the
//! container's last-page granule position.
//!
//! Duration comes straight from the granule position (sample count at the
//! end of the stream) over the sample rate. The reported bitrate is
//! measured from stream byte length over that duration when a duration is
//! known; the nominal bitrate declared by the encoder is only a fallback.

use crate::Identification;

/// Duration, bitrate, and passthrough stream parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioProperties {
    length_ms: u64,
    bitrate: u32,
    bitrate_maximum: i32,
    bitrate_nominal: i32,
    bitrate_minimum: i32,
    sample_rate: u32,
    channels: u8,
    vorbis_version: u32,
}

impl AudioProperties {
    /// Derive the properties for a stream of `stream_len` bytes whose last
    /// page carries `last_granule`.
    pub fn compute(
        identification: &Identification,
        last_granule: Option<i64>,
        stream_len: u64,
    ) -> Self {
        let length_ms = match last_granule {
            Some(granule) if granule > 0 && identification.sample_rate > 0 => {
                granule as u64 * 1000 / u64::from(identification.sample_rate)
            }
            _ => 0,
        };

        // Bits per millisecond is kbit/s; rounded half up like the length
        // it is derived from. Nominal only fills in when no duration exists.
        let bitrate = if length_ms > 0 && stream_len > 0 {
            ((stream_len * 8 + length_ms / 2) / length_ms) as u32
        } else if identification.bitrate_nominal > 0 {
            (identification.bitrate_nominal as u32 + 500) / 1000
        } else {
            0
        };

        Self {
            length_ms,
            bitrate,
            bitrate_maximum: identification.bitrate_maximum,
            bitrate_nominal: identification.bitrate_nominal,
            bitrate_minimum: identification.bitrate_minimum,
            sample_rate: identification.sample_rate,
            channels: identification.channels,
            vorbis_version: identification.version,
        }
    }

    /// Duration in milliseconds; 0 when the stream carries no granule.
    pub fn length_ms(&self) -> u64 {
        self.length_ms
    }

    /// Duration in whole seconds.
    pub fn length_seconds(&self) -> u64 {
        self.length_ms / 1000
    }

    /// Measured bitrate in kbit/s, or the nominal rate when unmeasurable.
    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// Maximum bitrate the encoder declared, bits per second.
    pub fn bitrate_maximum(&self) -> i32 {
        self.bitrate_maximum
    }

    /// Nominal bitrate the encoder declared, bits per second.
    pub fn bitrate_nominal(&self) -> i32 {
        self.bitrate_nominal
    }

    /// Minimum bitrate the encoder declared, bits per second.
    pub fn bitrate_minimum(&self) -> i32 {
        self.bitrate_minimum
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of audio channels.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Vorbis version from the identification header.
    pub fn vorbis_version(&self) -> u32 {
        self.vorbis_version
    }
}
