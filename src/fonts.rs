//! Font family configuration.

use serde::Deserialize;

/// Ordered list of font family names.
///
/// Position 0 is the primary family; later entries are fallbacks tried
/// in order when the primary face lacks a glyph. An empty list is
/// invalid and rejected by `set_font_family`.
///
/// The type deserializes from a plain string list, so it can be lifted
/// directly out of a configuration file:
///
/// ```toml
/// font-families = ["Hiragino Sans", "Noto Sans CJK JP"]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FontFamilies(Vec<String>);

impl FontFamilies {
    pub fn new(families: Vec<String>) -> Self {
        Self(families)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the family name at `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for FontFamilies {
    fn from(families: Vec<String>) -> Self {
        Self(families)
    }
}

impl From<&[&str]> for FontFamilies {
    fn from(families: &[&str]) -> Self {
        Self(families.iter().map(|f| f.to_string()).collect())
    }
}
