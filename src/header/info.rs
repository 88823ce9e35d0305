use crate::projection::micro_to_degrees;
use crate::tag::Tag;
use serde::Serialize;

/// A coordinate in microdegrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LatLon {
    /// Latitude in microdegrees
    pub latitude_e6: i32,
    /// Longitude in microdegrees
    pub longitude_e6: i32,
}

impl LatLon {
    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        micro_to_degrees(self.latitude_e6)
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        micro_to_degrees(self.longitude_e6)
    }
}

/// Area covered by a map file, in microdegrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BoundingBox {
    /// Southern edge
    pub min_latitude_e6: i32,
    /// Western edge
    pub min_longitude_e6: i32,
    /// Northern edge
    pub max_latitude_e6: i32,
    /// Eastern edge
    pub max_longitude_e6: i32,
}

impl BoundingBox {
    /// Southern edge in degrees.
    pub fn min_latitude(&self) -> f64 {
        micro_to_degrees(self.min_latitude_e6)
    }

    /// Western edge in degrees.
    pub fn min_longitude(&self) -> f64 {
        micro_to_degrees(self.min_longitude_e6)
    }

    /// Northern edge in degrees.
    pub fn max_latitude(&self) -> f64 {
        micro_to_degrees(self.max_latitude_e6)
    }

    /// Eastern edge in degrees.
    pub fn max_longitude(&self) -> f64 {
        micro_to_degrees(self.max_longitude_e6)
    }

    /// Midpoint of the box.
    pub fn center(&self) -> LatLon {
        LatLon {
            latitude_e6: ((self.min_latitude_e6 as i64 + self.max_latitude_e6 as i64) / 2) as i32,
            longitude_e6: ((self.min_longitude_e6 as i64 + self.max_longitude_e6 as i64) / 2)
                as i32,
        }
    }

    /// Whether the point lies inside or on the edge.
    pub fn contains(&self, point: LatLon) -> bool {
        (self.min_latitude_e6..=self.max_latitude_e6).contains(&point.latitude_e6)
            && (self.min_longitude_e6..=self.max_longitude_e6).contains(&point.longitude_e6)
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_latitude_e6: self.min_latitude_e6.min(other.min_latitude_e6),
            min_longitude_e6: self.min_longitude_e6.min(other.min_longitude_e6),
            max_latitude_e6: self.max_latitude_e6.max(other.max_latitude_e6),
            max_longitude_e6: self.max_longitude_e6.max(other.max_longitude_e6),
        }
    }
}

/// Immutable metadata read from a map file header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    /// Covered area
    pub bounding_box: BoundingBox,
    /// Format version, 3 or 4
    pub file_version: i32,
    /// Size of the file in bytes, as declared and verified
    pub file_size: u64,
    /// Creation time in milliseconds since the Unix epoch
    pub map_date: i64,
    /// Always `Mercator`
    pub projection_name: String,
    /// Tile size the file was written for
    pub tile_pixel_size: i16,
    /// POI tag dictionary; the position is the tag ID
    pub poi_tags: Vec<Tag>,
    /// Way tag dictionary; the position is the tag ID
    pub way_tags: Vec<Tag>,
    /// Base zoom level of every sub-file, in file order
    pub zoom_levels: Vec<u8>,
    /// Suggested initial map center
    pub start_position: Option<LatLon>,
    /// Suggested initial zoom level
    pub start_zoom_level: Option<u8>,
    /// Comma-separated language codes of localized names
    pub languages_preference: Option<String>,
    /// Free-form comment
    pub comment: Option<String>,
    /// Name of the writer
    pub created_by: Option<String>,
    /// Whether the file carries debug signatures
    pub debug_file: bool,
}

impl FileInfo {
    /// Number of sub-files.
    pub fn number_of_sub_files(&self) -> usize {
        self.zoom_levels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_and_contains() {
        let a = BoundingBox {
            min_latitude_e6: 10,
            min_longitude_e6: 20,
            max_latitude_e6: 30,
            max_longitude_e6: 40,
        };
        let b = BoundingBox {
            min_latitude_e6: -5,
            min_longitude_e6: 25,
            max_latitude_e6: 15,
            max_longitude_e6: 50,
        };
        let u = a.union(&b);
        assert_eq!(u.min_latitude_e6, -5);
        assert_eq!(u.max_longitude_e6, 50);
        assert!(u.contains(LatLon {
            latitude_e6: 0,
            longitude_e6: 45
        }));
        assert!(!a.contains(LatLon {
            latitude_e6: 0,
            longitude_e6: 45
        }));
        assert_eq!(a.center(), LatLon { latitude_e6: 20, longitude_e6: 30 });
    }
}
