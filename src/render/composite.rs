//! Per-pixel blending on premultiplied RGBA8.
//!
//! `Normal` is plain source-over. The separable modes follow the standard
//! formula: blend the straight colors, mix the blended color with the source
//! by backdrop alpha, then composite source-over.

use crate::{
    composition::model::BlendMode,
    foundation::math::{mul_div255_u8, unpremul_u8},
};

pub type PremulRgba8 = [u8; 4];

pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    let inv = 255u16 - u16::from(src[3]);

    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255_u8(u16::from(dst[i]), inv));
    }
    out
}

pub fn blend(dst: PremulRgba8, src: PremulRgba8, mode: BlendMode) -> PremulRgba8 {
    match mode {
        BlendMode::Normal => over(dst, src),
        BlendMode::Multiply => separable(dst, src, |b, s| mul_div255_u8(b.into(), s.into())),
        BlendMode::Screen => separable(dst, src, |b, s| {
            255 - mul_div255_u8(u16::from(255 - b), u16::from(255 - s))
        }),
        BlendMode::Darken => separable(dst, src, u8::min),
        BlendMode::Lighten => separable(dst, src, u8::max),
    }
}

fn separable(dst: PremulRgba8, src: PremulRgba8, f: fn(u8, u8) -> u8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }

    let da = dst[3];
    let sa = src[3];
    let mut mixed = [0u8; 4];
    mixed[3] = sa;
    for i in 0..3 {
        let cb = unpremul_u8(dst[i], da);
        let cs = unpremul_u8(src[i], sa);
        let blended = f(cb, cs);
        // Where the backdrop is transparent the source shows through unblended.
        let straight = mul_div255_u8(u16::from(255 - da), u16::from(cs))
            .saturating_add(mul_div255_u8(u16::from(da), u16::from(blended)));
        mixed[i] = mul_div255_u8(u16::from(straight), u16::from(sa));
    }
    over(dst, mixed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: PremulRgba8 = [255, 0, 0, 255];
    const WHITE: PremulRgba8 = [255, 255, 255, 255];
    const BLACK: PremulRgba8 = [0, 0, 0, 255];
    const CLEAR: PremulRgba8 = [0, 0, 0, 0];

    #[test]
    fn over_src_alpha_0_is_noop() {
        let dst = [10, 20, 30, 40];
        assert_eq!(over(dst, CLEAR), dst);
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        assert_eq!(over(BLACK, RED), RED);
    }

    #[test]
    fn over_dst_transparent_returns_src() {
        let src = [100, 110, 120, 200];
        assert_eq!(over(CLEAR, src), src);
    }

    #[test]
    fn multiply_by_white_keeps_backdrop_color() {
        assert_eq!(blend(RED, WHITE, BlendMode::Multiply), RED);
    }

    #[test]
    fn multiply_by_black_is_black() {
        assert_eq!(blend(RED, BLACK, BlendMode::Multiply), BLACK);
    }

    #[test]
    fn screen_with_black_keeps_backdrop_color() {
        assert_eq!(blend(RED, BLACK, BlendMode::Screen), RED);
    }

    #[test]
    fn screen_with_white_is_white() {
        assert_eq!(blend(RED, WHITE, BlendMode::Screen), WHITE);
    }

    #[test]
    fn darken_and_lighten_pick_extremes() {
        let grey: PremulRgba8 = [128, 128, 128, 255];
        assert_eq!(blend(grey, WHITE, BlendMode::Darken), grey);
        assert_eq!(blend(grey, BLACK, BlendMode::Lighten), grey);
        assert_eq!(blend(grey, WHITE, BlendMode::Lighten), WHITE);
        assert_eq!(blend(grey, BLACK, BlendMode::Darken), BLACK);
    }

    #[test]
    fn separable_over_transparent_backdrop_passes_source_through() {
        assert_eq!(blend(CLEAR, RED, BlendMode::Multiply), RED);
        assert_eq!(blend(CLEAR, RED, BlendMode::Screen), RED);
    }
}
