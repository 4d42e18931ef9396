//! Alpha blending kernels.

use crate::color::ColorRGBA;

/// Divides a 16-bit intermediate by 255 with rounding.
#[inline(always)]
fn div_255(v: u32) -> u32 {
    (v + 128) * 257 >> 16
}

/// Source-over blend of straight-alpha colors.
#[inline]
pub fn alpha_blend(dst: ColorRGBA, src: ColorRGBA) -> ColorRGBA {
    let sa = src.a as u32;
    if sa == 0xff {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let da = div_255(dst.a as u32 * (255 - sa));
    let out_a = sa + da;
    if out_a == 0 {
        return ColorRGBA::default();
    }
    let channel = |s: u8, d: u8| ((s as u32 * sa + d as u32 * da) / out_a) as u8;
    ColorRGBA {
        r: channel(src.r, dst.r),
        g: channel(src.g, dst.g),
        b: channel(src.b, dst.b),
        a: out_a as u8,
    }
}

/// Writes `width` pixels of `color` into `dest`, scaling the color's
/// alpha by the corresponding 8-bit coverage sample in `src_alphas`.
pub fn fill_line_with_alphas(
    dest: &mut [ColorRGBA],
    src_alphas: &[u8],
    color: ColorRGBA,
    width: usize,
) {
    for (dst, alpha) in dest[..width].iter_mut().zip(&src_alphas[..width]) {
        *dst = color.with_alpha(div_255(color.a as u32 * *alpha as u32) as u8);
    }
}
