//! Text rendering core for Japanese ARIB broadcast captions.
//!
//! One call renders one code point: the renderer resolves a face from
//! an ordered family list (falling back per family when the primary
//! face lacks the glyph), applies the OpenType `hwid` half-width
//! substitution when a half-em draw is requested, rasterizes fill and
//! optional stroke, and composites the colored result into a caller
//! supplied RGBA bitmap together with an optional underline.
//!
//! Platform collaborators stay outside the crate: a
//! [`FontProvider`](provider::FontProvider) enumerates installed fonts
//! and an [`OutlineEngine`](engine::OutlineEngine) wraps the glyph
//! outline library.
//!
//! ```no_run
//! use aribtext::{Bitmap, CharStyle, ColorRGBA, FallbackPolicy, FontFamilies, TextRenderer};
//! # fn demo<E: aribtext::engine::OutlineEngine, P: aribtext::provider::FontProvider>(
//! #     engine: E,
//! #     provider: P,
//! # ) {
//! let mut renderer = TextRenderer::new(engine, provider);
//! assert!(renderer.initialize());
//! renderer.set_font_family(&FontFamilies::from(&["Hiragino Sans"][..]));
//!
//! let mut bitmap = Bitmap::new(64, 64);
//! let mut ctx = renderer.begin_draw(&mut bitmap);
//! renderer.draw_char(
//!     &mut ctx,
//!     0,
//!     0,
//!     'ア' as u32,
//!     CharStyle::empty(),
//!     ColorRGBA::opaque(255, 255, 255),
//!     ColorRGBA::opaque(0, 0, 0),
//!     0.0,
//!     36,
//!     36,
//!     None,
//!     FallbackPolicy::Auto,
//! );
//! renderer.end_draw(ctx);
//! # }
//! ```

pub mod alphablend;
pub mod bitmap;
pub mod color;
pub mod engine;
pub mod fonts;
pub mod opentype;
pub mod provider;
mod renderer;
mod shared_data;

pub use crate::bitmap::{Bitmap, Canvas, Rect};
pub use crate::color::ColorRGBA;
pub use crate::fonts::FontFamilies;
pub use crate::renderer::{
    CharStyle, FallbackPolicy, TextRenderContext, TextRenderStatus, TextRenderer, UnderlineInfo,
};
pub use crate::shared_data::SharedData;
