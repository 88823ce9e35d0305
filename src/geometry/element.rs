use super::GeometryBuffer;
use crate::tag::TagSet;
use std::ops::{Deref, DerefMut};

/// Layer assigned when a record does not say otherwise.
pub const DEFAULT_LAYER: u8 = 5;

/// One decoded POI or way: geometry in tile pixels plus tags and layer.
///
/// The decoder reuses a single element for every record of a query. A
/// sink sees it only for the duration of one `process` call and must copy
/// out whatever it wants to keep.
#[derive(Debug, Clone)]
pub struct MapElement {
    /// Projected geometry
    pub geometry: GeometryBuffer,
    /// Tags of the record
    pub tags: TagSet,
    /// Drawing layer, nominally 0 to 10
    pub layer: u8,
    /// Label anchor in tile pixels, when the way stores one
    pub label_position: Option<(f32, f32)>,
}

impl Default for MapElement {
    fn default() -> Self {
        Self::new(1024, 16)
    }
}

impl MapElement {
    /// An element with preallocated geometry storage.
    pub fn new(num_points: usize, num_indices: usize) -> Self {
        Self {
            geometry: GeometryBuffer::new(num_points, num_indices),
            tags: TagSet::new(),
            layer: DEFAULT_LAYER,
            label_position: None,
        }
    }

    /// Reset geometry and layer. Tags survive, so every coordinate block of
    /// a way shares the tags read for its record.
    pub fn clear(&mut self) {
        self.layer = DEFAULT_LAYER;
        self.geometry.clear();
    }

    /// Set the drawing layer.
    pub fn set_layer(&mut self, layer: u8) {
        self.layer = layer;
    }
}

impl Deref for MapElement {
    type Target = GeometryBuffer;

    fn deref(&self) -> &GeometryBuffer {
        &self.geometry
    }
}

impl DerefMut for MapElement {
    fn deref_mut(&mut self) -> &mut GeometryBuffer {
        &mut self.geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Tag;

    #[test]
    fn test_clear_resets_layer_keeps_tags() {
        let mut e = MapElement::default();
        e.tags.add(Tag::new("building", "yes"));
        e.set_layer(9);
        e.start_points().unwrap();
        e.add_point(1.0, 2.0);

        e.clear();
        assert_eq!(e.layer, DEFAULT_LAYER);
        assert_eq!(e.num_points(), 0);
        assert_eq!(e.tags.len(), 1);
    }
}
