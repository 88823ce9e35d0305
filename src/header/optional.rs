//! Header fields announced by the optional-fields flag byte

use super::info::LatLon;
use super::required::{LATITUDE_MAX_E6, LATITUDE_MIN_E6, LONGITUDE_MAX_E6, LONGITUDE_MIN_E6};
use crate::error::{MapError, Result};
use crate::read_buffer::ReadBuffer;

const FLAG_DEBUG: u8 = 0x80;
const FLAG_START_POSITION: u8 = 0x40;
const FLAG_START_ZOOM_LEVEL: u8 = 0x20;
const FLAG_LANGUAGES_PREFERENCE: u8 = 0x10;
const FLAG_COMMENT: u8 = 0x08;
const FLAG_CREATED_BY: u8 = 0x04;

/// Highest start zoom level a file may suggest.
pub const START_ZOOM_LEVEL_MAX: i8 = 22;

#[derive(Debug, Default)]
pub(crate) struct OptionalFields {
    pub debug_file: bool,
    pub start_position: Option<LatLon>,
    pub start_zoom_level: Option<u8>,
    pub languages_preference: Option<String>,
    pub comment: Option<String>,
    pub created_by: Option<String>,
}

impl OptionalFields {
    pub(crate) fn read(buffer: &mut ReadBuffer) -> Result<Self> {
        let flags = buffer.read_byte()?;
        let mut fields = OptionalFields {
            debug_file: flags & FLAG_DEBUG != 0,
            ..Default::default()
        };

        if flags & FLAG_START_POSITION != 0 {
            let lat = buffer.read_int()?;
            if !(LATITUDE_MIN_E6..=LATITUDE_MAX_E6).contains(&lat) {
                return Err(MapError::format(format!(
                    "invalid map start latitude: {}",
                    lat
                )));
            }
            let lon = buffer.read_int()?;
            if !(LONGITUDE_MIN_E6..=LONGITUDE_MAX_E6).contains(&lon) {
                return Err(MapError::format(format!(
                    "invalid map start longitude: {}",
                    lon
                )));
            }
            fields.start_position = Some(LatLon {
                latitude_e6: lat,
                longitude_e6: lon,
            });
        }

        if flags & FLAG_START_ZOOM_LEVEL != 0 {
            let zoom = buffer.read_byte()? as i8;
            if !(0..=START_ZOOM_LEVEL_MAX).contains(&zoom) {
                return Err(MapError::format(format!(
                    "invalid map start zoom level: {}",
                    zoom
                )));
            }
            fields.start_zoom_level = Some(zoom as u8);
        }

        if flags & FLAG_LANGUAGES_PREFERENCE != 0 {
            fields.languages_preference = Some(buffer.read_utf8_string()?);
        }
        if flags & FLAG_COMMENT != 0 {
            fields.comment = Some(buffer.read_utf8_string()?);
        }
        if flags & FLAG_CREATED_BY != 0 {
            fields.created_by = Some(buffer.read_utf8_string()?);
        }

        Ok(fields)
    }
}
