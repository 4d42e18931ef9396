//! Contract with the glyph outline library.
//!
//! The renderer never talks to an outline library directly; everything
//! it needs from one is expressed by [`OutlineEngine`]. A production
//! binding wraps a real library behind this trait, and the test suite
//! substitutes a synthetic engine with deterministic faces.

use std::path::Path;

use thiserror::Error;

use crate::opentype::Tag;
use crate::shared_data::SharedData;

/// SFNT name table platform id for Microsoft records, whose strings
/// are big endian UTF-16.
pub const PLATFORM_MICROSOFT: u16 = 3;

/// SFNT name id of the font family name.
pub const NAME_ID_FONT_FAMILY: u16 = 1;

/// SFNT name id of the full font name.
pub const NAME_ID_FULL_NAME: u16 = 4;

/// Errors surfaced by an outline engine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("face could not be opened")]
    FaceNotOpened,
    #[error("pixel size could not be set")]
    SizeNotSet,
    #[error("glyph outline could not be loaded")]
    GlyphNotLoaded,
    #[error("outline could not be rasterized")]
    RasterizationFailed,
    #[error("outline border could not be stroked")]
    StrokeFailed,
}

/// A raw record from the SFNT `name` table.
#[derive(Clone, Debug)]
pub struct SfntName {
    pub platform_id: u16,
    pub name_id: u16,
    /// Undecoded string bytes; the encoding depends on `platform_id`.
    pub data: Vec<u8>,
}

/// 8-bit alpha glyph raster and its placement.
#[derive(Clone, Debug, Default)]
pub struct AlphaBitmap {
    /// Coverage samples, `rows` rows of `pitch` bytes each.
    pub buffer: Vec<u8>,
    /// Width of a row in samples.
    pub width: usize,
    /// Number of rows.
    pub rows: usize,
    /// Stride between rows in bytes, at least `width`.
    pub pitch: usize,
    /// Distance from the glyph origin up to the first raster row.
    pub top: i32,
    /// Distance from the glyph origin right to the first raster column.
    pub left: i32,
}

/// Face metrics at the currently configured pixel size.
///
/// The ascender and descender are scaled pixel values with the 26.6
/// fraction already shifted out. The underline pair stays in design
/// units the way outline libraries report it; scale with
/// `mul_fix(value, x_scale) >> 6`.
#[derive(Copy, Clone, Debug, Default)]
pub struct ScaledMetrics {
    /// Ascender in pixels.
    pub ascender: i32,
    /// Descender in pixels, negative below the baseline.
    pub descender: i32,
    /// Underline center offset in design units, typically negative.
    pub underline_position: i32,
    /// Underline thickness in design units.
    pub underline_thickness: i32,
    /// 16.16 scale factor from design units to 26.6 pixels.
    pub x_scale: i64,
}

/// Stroker line cap.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Square,
    #[default]
    Round,
}

/// Stroker line join.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LineJoin {
    Bevel,
    Miter,
    #[default]
    Round,
}

/// Multiplies a design-space value by a 16.16 fixed point scale,
/// rounding the way outline libraries do.
pub const fn mul_fix(value: i32, scale: i64) -> i64 {
    (value as i64 * scale + 0x8000) >> 16
}

/// Capability contract over the outline library.
pub trait OutlineEngine {
    /// An opened font face with its active pixel size.
    type Face;
    /// A loaded glyph outline.
    type Outline;

    /// Acquires the library handle backing this engine. Returns false
    /// when the library cannot be initialized; the engine is unusable
    /// in that case.
    fn init(&mut self) -> bool;

    fn open_face_from_path(
        &self,
        path: &Path,
        face_index: i64,
    ) -> Result<Self::Face, EngineError>;

    /// Opens a face from font bytes. Implementations keep a clone of
    /// `data`, which keeps the backing buffer alive for the face's
    /// lifetime.
    fn open_face_from_memory(
        &self,
        data: SharedData,
        face_index: i64,
    ) -> Result<Self::Face, EngineError>;

    /// Number of faces in the file or collection this face came from.
    fn num_faces(&self, face: &Self::Face) -> usize;

    fn postscript_name(&self, face: &Self::Face) -> Option<String>;

    fn sfnt_name_count(&self, face: &Self::Face) -> usize;

    fn sfnt_name(&self, face: &Self::Face, index: usize) -> Option<SfntName>;

    /// Maps a code point through the face's cmap. Zero means the face
    /// has no glyph for the code point.
    fn glyph_index(&self, face: &Self::Face, code_point: u32) -> u16;

    fn set_pixel_sizes(
        &self,
        face: &mut Self::Face,
        width: u32,
        height: u32,
    ) -> Result<(), EngineError>;

    fn load_outline(
        &self,
        face: &Self::Face,
        glyph_id: u16,
    ) -> Result<Self::Outline, EngineError>;

    /// Rasterizes an outline to an 8-bit alpha mask.
    fn rasterize(&self, outline: &Self::Outline) -> Result<AlphaBitmap, EngineError>;

    /// Strokes the border of an outline. `width` is in 26.6 fixed
    /// point units (pixels times 64).
    fn stroke_border(
        &self,
        outline: &Self::Outline,
        width: i64,
        cap: LineCap,
        join: LineJoin,
    ) -> Result<Self::Outline, EngineError>;

    /// Reads a raw SFNT table, or `None` when the face has no table
    /// with that tag.
    fn sfnt_table(&self, face: &Self::Face, tag: Tag) -> Option<Vec<u8>>;

    /// Metrics for the currently configured pixel size.
    fn scaled_metrics(&self, face: &Self::Face) -> ScaledMetrics;
}
