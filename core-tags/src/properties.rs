//! Audio stream properties.
//!
//! FLAC, MP3 and MP4 properties come from `lofty`. ASF, which lofty does
//! not read, takes them from the WMA adapter's File and Stream Properties
//! objects. Failure never aborts a load; the properties stay at their
//! defaults.

use std::io::Cursor;

use lofty::config::ParseOptions;
use lofty::file::{AudioFile, FileType};
use lofty::probe::Probe;
use serde::Serialize;
use tracing::{debug, warn};

use crate::container::asf::AsfStore;
use crate::tag_map::FormatKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AudioProperties {
    /// Length in seconds
    pub length: f64,
    /// Bit rate in kbps
    pub bit_rate: u32,
    pub sample_rate: u32,
    pub bit_depth: Option<u8>,
    pub channels: u8,
}

impl AudioProperties {
    pub fn read(kind: FormatKind, data: &[u8]) -> Self {
        let probed = match kind {
            FormatKind::Flac => Self::from_lofty(FileType::Flac, data),
            FormatKind::Mp3 => Self::from_lofty(FileType::Mpeg, data),
            FormatKind::Mp4 => Self::from_lofty(FileType::Mp4, data),
            FormatKind::Wma => Self::from_asf(data),
        };

        probed.unwrap_or_else(|| {
            warn!(format = kind.name(), "Could not read audio properties, using defaults");
            Self::default()
        })
    }

    fn from_lofty(file_type: FileType, data: &[u8]) -> Option<Self> {
        let tagged_file = match Probe::new(Cursor::new(data))
            .options(ParseOptions::new())
            .set_file_type(file_type)
            .read()
        {
            Ok(file) => file,
            Err(e) => {
                debug!("lofty could not parse {:?} stream: {}", file_type, e);
                return None;
            }
        };

        let properties = tagged_file.properties();
        Some(Self {
            length: properties.duration().as_secs_f64(),
            bit_rate: properties.audio_bitrate().unwrap_or(0),
            sample_rate: properties.sample_rate().unwrap_or(0),
            bit_depth: properties.bit_depth(),
            channels: properties.channels().unwrap_or(0),
        })
    }

    fn from_asf(data: &[u8]) -> Option<Self> {
        let info = AsfStore::parse(data).ok()?.audio_info();
        Some(Self {
            length: info.duration_secs,
            bit_rate: info.bitrate / 1000,
            sample_rate: info.sample_rate,
            bit_depth: u8::try_from(info.bits_per_sample).ok().filter(|&b| b > 0),
            channels: u8::try_from(info.channels).unwrap_or(0),
        })
    }
}
