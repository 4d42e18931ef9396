//! Caption text renderer: face resolution with fallback, half-width
//! substitution and glyph compositing.

use std::path::Path;

use tracing::{debug, error, warn};

use crate::alphablend;
use crate::bitmap::{Bitmap, Canvas, Rect};
use crate::color::ColorRGBA;
use crate::engine::{
    mul_fix, AlphaBitmap, LineCap, LineJoin, OutlineEngine, SfntName, NAME_ID_FONT_FAMILY,
    NAME_ID_FULL_NAME, PLATFORM_MICROSOFT,
};
use crate::fonts::FontFamilies;
use crate::opentype::{
    gsub, FEATURE_HALF_WIDTH, GSUB, LANG_SYS_JAPANESE, SCRIPT_KANA,
};
use crate::provider::{FontProvider, FontProviderError, FontfaceInfo};
use crate::shared_data::SharedData;

bitflags::bitflags! {
    /// Style flags for a single drawn character. The default style is
    /// the empty set.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct CharStyle: u32 {
        /// Draw a stroked border behind the fill.
        const STROKE = 1 << 0;
        /// Draw an underline across the character cell.
        const UNDERLINE = 1 << 1;
    }
}

/// Outcome of a draw operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextRenderStatus {
    Ok,
    FontNotFound,
    CodePointNotFound,
    OtherError,
}

/// Fallback behavior when the primary face lacks a code point.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Walk the remaining families for a face that has the glyph.
    #[default]
    Auto,
    /// Report missing code points without consulting fallbacks.
    FailOnCodePointNotFound,
}

/// Underline span for a drawn character.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UnderlineInfo {
    pub start_x: i32,
    pub width: i32,
}

/// Drawing pass over one target bitmap.
pub struct TextRenderContext<'a> {
    bitmap: &'a mut Bitmap,
}

/// Code points rendered as a successful no-op.
fn is_whitespace(ucs4: u32) -> bool {
    matches!(
        ucs4,
        0x0009 | 0x0020 | 0x00a0 | 0x1680 | 0x202f | 0x205f | 0x3000
    ) || (0x2000..=0x200a).contains(&ucs4)
}

fn provider_error_to_status(error: FontProviderError) -> TextRenderStatus {
    match error {
        FontProviderError::FontNotFound => TextRenderStatus::FontNotFound,
        FontProviderError::OtherError => TextRenderStatus::OtherError,
    }
}

/// One opened face, the buffer backing it when it was opened from
/// memory, and the face's lazily computed half-width map.
struct FaceSlot<F> {
    face: Option<F>,
    data: Option<SharedData>,
    /// Index into the family list that produced the face.
    family_index: usize,
    /// `None` until the first half-width draw with this face; then the
    /// computed map, possibly empty.
    half_width_map: Option<gsub::SubstMap>,
}

impl<F> FaceSlot<F> {
    fn empty() -> Self {
        Self {
            face: None,
            data: None,
            family_index: 0,
            half_width_map: None,
        }
    }

    fn reset(&mut self) {
        // The face drops before its backing data.
        self.face = None;
        self.data = None;
        self.family_index = 0;
        self.half_width_map = None;
    }

    fn install(&mut self, loaded: LoadedFace<F>) {
        self.reset();
        self.face = Some(loaded.face);
        self.data = loaded.data;
        self.family_index = loaded.family_index;
    }
}

/// A face freshly opened by the family-list walk.
struct LoadedFace<F> {
    face: F,
    family_index: usize,
    data: Option<SharedData>,
}

/// Which slot a draw resolved its face from.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Selection {
    Main,
    Fallback,
}

/// Renders single caption characters into RGBA bitmaps.
///
/// The renderer owns its outline engine and font provider and carries
/// mutable face-slot state; instances are single threaded and callers
/// sharing one across threads must serialize externally.
pub struct TextRenderer<E: OutlineEngine, P: FontProvider> {
    engine: E,
    provider: P,
    font_families: FontFamilies,
    main: FaceSlot<E::Face>,
    fallback: FaceSlot<E::Face>,
}

impl<E: OutlineEngine, P: FontProvider> TextRenderer<E, P> {
    pub fn new(engine: E, provider: P) -> Self {
        Self {
            engine,
            provider,
            font_families: FontFamilies::default(),
            main: FaceSlot::empty(),
            fallback: FaceSlot::empty(),
        }
    }

    /// Acquires the outline library handle. Must succeed before any
    /// draw call.
    pub fn initialize(&mut self) -> bool {
        if !self.engine.init() {
            error!("outline engine failed to initialize");
            return false;
        }
        true
    }

    /// Accepted and ignored; reserved for variants with
    /// language-sensitive shaping.
    pub fn set_language(&mut self, _iso6392_language_code: u32) {}

    /// Replaces the family list. Passing a list equal to the current
    /// one keeps the loaded faces; a different list drops both slots.
    pub fn set_font_family(&mut self, families: &FontFamilies) -> bool {
        if families.is_empty() {
            return false;
        }
        if !self.font_families.is_empty() && self.font_families != *families {
            self.main.reset();
            self.fallback.reset();
        }
        self.font_families = families.clone();
        true
    }

    pub fn begin_draw<'a>(&self, bitmap: &'a mut Bitmap) -> TextRenderContext<'a> {
        TextRenderContext { bitmap }
    }

    pub fn end_draw(&self, _context: TextRenderContext) {}

    /// Draws one character into the context's bitmap.
    ///
    /// All fallible preparation happens before any painting, so a
    /// non-[`Ok`](TextRenderStatus::Ok) return leaves the bitmap
    /// untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_char(
        &mut self,
        context: &mut TextRenderContext,
        target_x: i32,
        target_y: i32,
        ucs4: u32,
        style: CharStyle,
        color: ColorRGBA,
        stroke_color: ColorRGBA,
        stroke_width: f32,
        char_width: i32,
        char_height: i32,
        underline_info: Option<UnderlineInfo>,
        fallback_policy: FallbackPolicy,
    ) -> TextRenderStatus {
        debug_assert!(char_height > 0);
        let stroke_width = stroke_width.max(0.0);
        let mut char_width = char_width;

        if is_whitespace(ucs4) {
            return TextRenderStatus::Ok;
        }

        if self.main.face.is_none() {
            // The code point does not matter yet; any face from the
            // family list can serve as the primary.
            match self.load_font_face(false, None, None) {
                Ok(loaded) => self.main.install(loaded),
                Err(err) => {
                    error!("no usable primary font in the family list");
                    return provider_error_to_status(err);
                }
            }
        }
        let Some(main_face) = self.main.face.as_ref() else {
            return TextRenderStatus::OtherError;
        };

        let mut selection = Selection::Main;
        let mut glyph_id = self.engine.glyph_index(main_face, ucs4);

        if glyph_id == 0 {
            warn!("primary font has no glyph for U+{ucs4:04X}");

            if fallback_policy == FallbackPolicy::FailOnCodePointNotFound {
                return TextRenderStatus::CodePointNotFound;
            }

            let fallback_glyph = match self.fallback.face.as_ref() {
                Some(face) => self.engine.glyph_index(face, ucs4),
                None => 0,
            };
            if fallback_glyph != 0 {
                selection = Selection::Fallback;
                glyph_id = fallback_glyph;
            } else if self.main.family_index + 1 >= self.font_families.len() {
                // No families left to try.
                return TextRenderStatus::CodePointNotFound;
            } else {
                let begin = self.main.family_index + 1;
                match self.load_font_face(true, Some(ucs4), Some(begin)) {
                    Ok(loaded) => self.fallback.install(loaded),
                    Err(err) => {
                        error!("no fallback font available for U+{ucs4:04X}");
                        return provider_error_to_status(err);
                    }
                }
                selection = Selection::Fallback;
                let Some(face) = self.fallback.face.as_ref() else {
                    return TextRenderStatus::OtherError;
                };
                glyph_id = self.engine.glyph_index(face, ucs4);
                if glyph_id == 0 {
                    error!("fallback font also lacks U+{ucs4:04X}");
                    return TextRenderStatus::CodePointNotFound;
                }
            }
        }

        let (engine, slot) = match selection {
            Selection::Main => (&self.engine, &mut self.main),
            Selection::Fallback => (&self.engine, &mut self.fallback),
        };
        let FaceSlot {
            face,
            half_width_map,
            ..
        } = slot;
        let Some(face) = face.as_mut() else {
            return TextRenderStatus::OtherError;
        };

        if char_width == char_height / 2 {
            let map = half_width_map.get_or_insert_with(|| {
                let table = engine.sfnt_table(face, GSUB).unwrap_or_default();
                gsub::single_subst_map(&table, FEATURE_HALF_WIDTH, SCRIPT_KANA, LANG_SYS_JAPANESE)
            });
            if let Some(&substitute) = map.get(&glyph_id) {
                debug!("half-width substitution {glyph_id} -> {substitute}");
                glyph_id = substitute;
                // The substituted glyph is already half width; render it
                // on the full em square.
                char_width = char_height;
            }
        }

        if engine
            .set_pixel_sizes(face, char_width as u32, char_height as u32)
            .is_err()
        {
            error!("failed to set pixel size {char_width}x{char_height}");
            return TextRenderStatus::OtherError;
        }

        let outline = match engine.load_outline(face, glyph_id) {
            Ok(outline) => outline,
            Err(err) => {
                error!("failed to load glyph {glyph_id}: {err}");
                return TextRenderStatus::OtherError;
            }
        };
        let fill = match engine.rasterize(&outline) {
            Ok(bitmap) => bitmap,
            Err(err) => {
                error!("failed to rasterize glyph {glyph_id}: {err}");
                return TextRenderStatus::OtherError;
            }
        };

        let border = if style.contains(CharStyle::STROKE) && stroke_width > 0.0 {
            // Stroking mutates the outline, so start from a fresh load.
            let outline = match engine.load_outline(face, glyph_id) {
                Ok(outline) => outline,
                Err(err) => {
                    error!("failed to reload glyph {glyph_id}: {err}");
                    return TextRenderStatus::OtherError;
                }
            };
            let stroked = match engine.stroke_border(
                &outline,
                (stroke_width * 64.0) as i64,
                LineCap::Round,
                LineJoin::Round,
            ) {
                Ok(stroked) => stroked,
                Err(err) => {
                    error!("failed to stroke glyph {glyph_id}: {err}");
                    return TextRenderStatus::OtherError;
                }
            };
            match engine.rasterize(&stroked) {
                Ok(bitmap) => Some(bitmap),
                Err(err) => {
                    error!("failed to rasterize stroke of glyph {glyph_id}: {err}");
                    return TextRenderStatus::OtherError;
                }
            }
        } else {
            None
        };

        let metrics = engine.scaled_metrics(face);
        let ascender = metrics.ascender;
        let baseline = ascender;
        let underline = (mul_fix(metrics.underline_position, metrics.x_scale) >> 6) as i32;
        let underline_thickness =
            (mul_fix(metrics.underline_thickness, metrics.x_scale) >> 6) as i32;

        let em_height = ascender + metrics.descender.abs();
        let em_adjust_y = (char_height - em_height) / 2;

        let mut canvas = Canvas::new(context.bitmap);

        if style.contains(CharStyle::UNDERLINE) && underline_thickness > 0 {
            if let Some(info) = underline_info {
                let underline_y = target_y + baseline + em_adjust_y + underline.abs();
                let mut rect = Rect::new(
                    info.start_x,
                    underline_y,
                    info.start_x + info.width,
                    underline_y + 1,
                );
                let half_thickness = underline_thickness / 2;
                if underline_thickness % 2 != 0 {
                    rect.top -= half_thickness;
                    rect.bottom += half_thickness;
                } else {
                    rect.top -= half_thickness - 1;
                    rect.bottom += half_thickness;
                }
                canvas.draw_rect(color, rect);
            }
        }

        let origin_y = target_y + baseline + em_adjust_y;
        if let Some(border) = &border {
            let colored = colored_bitmap(border, stroke_color);
            canvas.draw_bitmap(&colored, target_x + border.left, origin_y - border.top);
        }
        let colored = colored_bitmap(&fill, color);
        canvas.draw_bitmap(&colored, target_x + fill.left, origin_y - fill.top);

        TextRenderStatus::Ok
    }

    /// Walks the family list from `begin_index` until the provider
    /// resolves a face, then opens it.
    fn load_font_face(
        &mut self,
        is_fallback: bool,
        code_point: Option<u32>,
        begin_index: Option<usize>,
    ) -> Result<LoadedFace<E::Face>, FontProviderError> {
        if begin_index.is_some_and(|begin| begin >= self.font_families.len()) {
            return Err(FontProviderError::FontNotFound);
        }
        let mut family_index = begin_index.unwrap_or(0);

        let mut result = self.request_font_face(family_index, code_point);
        while result.is_err() && family_index + 1 < self.font_families.len() {
            family_index += 1;
            result = self.request_font_face(family_index, code_point);
        }
        let mut info = result?;
        debug!(
            "loading {} face from family #{family_index}",
            if is_fallback { "fallback" } else { "primary" },
        );

        let data = (!info.font_data.is_empty())
            .then(|| SharedData::new(std::mem::take(&mut info.font_data)));

        let face = self
            .open_face(&info, data.as_ref(), info.face_index)
            .ok_or(FontProviderError::FontNotFound)?;

        if info.face_index >= 0 {
            return Ok(LoadedFace {
                face,
                family_index,
                data,
            });
        }

        // The collection index is unknown; probe every face for a
        // matching PostScript or family name.
        if info.family_name.is_empty() && info.postscript_name.is_empty() {
            error!("face index unknown and no name hints to resolve it");
            return Err(FontProviderError::OtherError);
        }
        let num_faces = self.engine.num_faces(&face);
        drop(face);
        for index in 0..num_faces {
            let face = self
                .open_face(&info, data.as_ref(), index as i64)
                .ok_or(FontProviderError::FontNotFound)?;
            if !info.postscript_name.is_empty()
                && self.engine.postscript_name(&face).as_deref()
                    == Some(info.postscript_name.as_str())
            {
                return Ok(LoadedFace {
                    face,
                    family_index,
                    data,
                });
            }
            if !info.family_name.is_empty() && self.match_family_name(&face, &info.family_name) {
                return Ok(LoadedFace {
                    face,
                    family_index,
                    data,
                });
            }
        }
        Err(FontProviderError::FontNotFound)
    }

    fn request_font_face(
        &mut self,
        family_index: usize,
        code_point: Option<u32>,
    ) -> Result<FontfaceInfo, FontProviderError> {
        let Some(family) = self.font_families.get(family_index) else {
            return Err(FontProviderError::FontNotFound);
        };
        let family = family.to_owned();
        self.provider.get_font_face(&family, code_point)
    }

    fn open_face(
        &self,
        info: &FontfaceInfo,
        data: Option<&SharedData>,
        face_index: i64,
    ) -> Option<E::Face> {
        let result = match data {
            Some(data) => self.engine.open_face_from_memory(data.clone(), face_index),
            None => self
                .engine
                .open_face_from_path(Path::new(&info.filename), face_index),
        };
        result.ok()
    }

    /// Returns true if any SFNT family or full-name record matches.
    fn match_family_name(&self, face: &E::Face, family_name: &str) -> bool {
        let count = self.engine.sfnt_name_count(face);
        for index in 0..count {
            let Some(name) = self.engine.sfnt_name(face, index) else {
                continue;
            };
            if name.name_id != NAME_ID_FONT_FAMILY && name.name_id != NAME_ID_FULL_NAME {
                continue;
            }
            if decode_sfnt_name(&name) == family_name {
                return true;
            }
        }
        false
    }
}

/// Decodes an SFNT name record: Microsoft platform strings are big
/// endian UTF-16, everything else is treated as raw bytes.
fn decode_sfnt_name(name: &SfntName) -> String {
    if name.platform_id == PLATFORM_MICROSOFT {
        let units: Vec<u16> = name
            .data
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(&name.data).into_owned()
    }
}

/// Multiplies an alpha mask into a color, producing a blittable bitmap.
fn colored_bitmap(mask: &AlphaBitmap, color: ColorRGBA) -> Bitmap {
    let mut bitmap = Bitmap::new(mask.width, mask.rows);
    for y in 0..mask.rows {
        let row_start = y * mask.pitch;
        let src = &mask.buffer[row_start..row_start + mask.width];
        alphablend::fill_line_with_alphas(bitmap.row_mut(y), src, color, mask.width);
    }
    bitmap
}
