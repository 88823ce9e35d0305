use crate::tag::TagSet;

const RAILWAY_LINES: &[&str] = &[
    "rail",
    "tram",
    "subway",
    "monorail",
    "narrow_gauge",
    "preserved",
    "light_rail",
    "construction",
];

/// Guess from tags whether a closed way describes an area.
///
/// Meant for ways whose first and last node coincide, so it only answers
/// `false` when the tags say the feature is a closed line. An explicit
/// `area=yes|no` wins, area keys such as `building` or `landuse` win next,
/// and `highway`, `barrier` and common `railway` values make it a line
/// unless a later tag overrides. Keys and values compare case-insensitively.
pub fn is_area(tags: &TagSet) -> bool {
    let mut result = true;
    for tag in tags {
        let key = tag.key.to_lowercase();
        let value = tag.value.to_lowercase();
        match key.as_str() {
            "area" => match value.as_str() {
                "yes" | "y" | "true" => return true,
                "no" | "n" | "false" => return false,
                _ => {}
            },
            "aeroway" | "building" | "landuse" | "leisure" | "natural" => return true,
            "highway" | "barrier" => result = false,
            "railway" if RAILWAY_LINES.contains(&value.as_str()) => result = false,
            _ => {}
        }
    }
    result
}
