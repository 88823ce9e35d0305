//! Selection of localized names
//!
//! Names with translations are stored as one string: the default name,
//! then for each translation a `\r`, the language code, a `\b` and the
//! translated name.
//!
//! ```text
//! Wien\ren\bVienna\rfr\bVienne
//! ```
//!
//! # Example
//!
//! ```rust
//! use mapsforge_reader::language::extract_localized_name;
//!
//! let s = "Wien\ren\u{8}Vienna\rfr\u{8}Vienne";
//! assert_eq!(extract_localized_name(s, Some("FR")), "Vienne");
//! assert_eq!(extract_localized_name(s, Some("en-GB")), "Vienna");
//! assert_eq!(extract_localized_name(s, Some("it")), "Wien");
//! assert_eq!(extract_localized_name(s, None), "Wien");
//! ```

const LANGUAGE_SEPARATOR: char = '\r';
const NAME_SEPARATOR: char = '\u{8}';

/// Pick the name for `language` out of a multilingual name string.
///
/// An entry whose code equals `language` (ignoring ASCII case) wins.
/// Otherwise a regional request such as `de-AT` or `zh_TW` falls back to
/// the first entry whose code is a plain prefix of it (`de`, `zh`).
/// Anything else, including no language at all, yields the default name.
pub fn extract_localized_name<'a>(names: &'a str, language: Option<&str>) -> &'a str {
    let mut parts = names.split(LANGUAGE_SEPARATOR);
    let default = parts.next().unwrap_or("");
    let language = match language {
        Some(l) if !l.is_empty() => l,
        _ => return default,
    };

    let regional = language.contains('-') || language.contains('_');
    let mut fallback = None;
    for part in parts {
        let Some((code, name)) = part.split_once(NAME_SEPARATOR) else {
            continue;
        };
        if code.eq_ignore_ascii_case(language) {
            return name;
        }
        if fallback.is_none()
            && regional
            && !code.is_empty()
            && !code.contains('-')
            && language.len() > code.len()
            && language.is_char_boundary(code.len())
            && language[..code.len()].eq_ignore_ascii_case(code)
        {
            fallback = Some(name);
        }
    }
    fallback.unwrap_or(default)
}
