//! Shared sampling and blitting helpers for the renderer implementations.

use crate::{
    assets::cache::PreparedImage,
    composition::model::BlendMode,
    foundation::core::Rgba8Premul,
    render::surface::Surface,
};

/// Bilinear sample at normalized `(u, v)`, clamped to the image edges.
pub fn sample_bilinear(img: &PreparedImage, u: f64, v: f64) -> Rgba8Premul {
    let w = img.width as usize;
    let h = img.height as usize;
    debug_assert!(w > 0 && h > 0);

    let fx = (u * img.width as f64 - 0.5).clamp(0.0, (w - 1) as f64);
    let fy = (v * img.height as f64 - 0.5).clamp(0.0, (h - 1) as f64);
    let x0 = fx.floor() as usize;
    let y0 = fy.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let tx = fx - x0 as f64;
    let ty = fy - y0 as f64;

    let texel = |x: usize, y: usize| -> [f64; 4] {
        let i = (y * w + x) * 4;
        let d = &img.rgba8_premul[i..i + 4];
        [f64::from(d[0]), f64::from(d[1]), f64::from(d[2]), f64::from(d[3])]
    };

    let p00 = texel(x0, y0);
    let p10 = texel(x1, y0);
    let p01 = texel(x0, y1);
    let p11 = texel(x1, y1);

    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = p00[i] * (1.0 - tx) + p10[i] * tx;
        let bottom = p01[i] * (1.0 - tx) + p11[i] * tx;
        out[i] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    Rgba8Premul::from_array(out)
}

/// Stretch the whole image over the whole surface (never 1:1 placement),
/// compositing source-over.
pub fn blit_stretched(dst: &mut Surface, img: &PreparedImage) {
    let w = dst.width();
    let h = dst.height();
    for y in 0..h {
        let v = (f64::from(y) + 0.5) / f64::from(h);
        for x in 0..w {
            let u = (f64::from(x) + 0.5) / f64::from(w);
            let c = sample_bilinear(img, u, v);
            dst.blend_pixel(x, y, c, BlendMode::Normal);
        }
    }
}

/// Procedural placeholder drawn where no source image is configured: an 8x8
/// checkerboard over UV space.
pub fn checker_rgba(u: f64, v: f64) -> Rgba8Premul {
    let cell = |t: f64| (t * 8.0).floor() as i64;
    if (cell(u) + cell(v)).rem_euclid(2) == 0 {
        Rgba8Premul::opaque(200, 200, 200)
    } else {
        Rgba8Premul::opaque(90, 90, 90)
    }
}
