//! Contract with the platform font provider.

use thiserror::Error;

/// Errors surfaced by a font provider.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontProviderError {
    #[error("no font matched the requested family")]
    FontNotFound,
    #[error("font provider failure")]
    OtherError,
}

/// Description of a font face resolved by a provider.
#[derive(Clone, Debug, Default)]
pub struct FontfaceInfo {
    /// Path of the font file; consulted only when `font_data` is empty.
    pub filename: String,
    /// Index of the face inside a collection; negative means the index
    /// is unknown and the face must be found by name.
    pub face_index: i64,
    /// Raw font bytes. Non-empty data is authoritative over `filename`.
    pub font_data: Vec<u8>,
    /// Family name hint for resolving an unknown face index.
    pub family_name: String,
    /// PostScript name hint for resolving an unknown face index.
    pub postscript_name: String,
}

/// Resolves family names to concrete font faces.
///
/// Platform back ends (fontconfig, DirectWrite, Core Text) implement
/// this trait outside this crate.
pub trait FontProvider {
    /// Resolves a family name to a font face. When `code_point` is
    /// given, the provider should prefer faces that contain it.
    fn get_font_face(
        &mut self,
        family_name: &str,
        code_point: Option<u32>,
    ) -> Result<FontfaceInfo, FontProviderError>;
}
