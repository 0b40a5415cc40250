use crate::{
    composition::model::BlendMode,
    foundation::core::{Canvas, Rgba8Premul},
    foundation::error::{PackshotError, PackshotResult},
    foundation::math::{mul_div255_u8, unpremul_u8},
    render::composite,
};

/// Owned premultiplied RGBA8 draw target.
///
/// The tree walk keeps a stack of these: one per isolating node (mask), popped
/// and merged back after the node's children have drawn.
#[derive(Clone, Debug)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    /// A transparent surface. Zero sizes are rejected.
    pub fn new(width: u32, height: u32) -> PackshotResult<Self> {
        if width == 0 || height == 0 {
            return Err(PackshotError::validation("surface size must be > 0"));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| PackshotError::validation("surface size overflows"))?;
        Ok(Self {
            width,
            height,
            data: vec![0u8; len],
        })
    }

    pub fn for_canvas(canvas: Canvas) -> PackshotResult<Self> {
        Self::new(canvas.width, canvas.height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn row_stride(&self) -> usize {
        self.width as usize * 4
    }

    pub fn clear(&mut self, color: Rgba8Premul) {
        let px = color.to_array();
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8Premul> {
        let i = self.offset(x, y)?;
        Some(Rgba8Premul::from_array([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]))
    }

    /// Overwrite one pixel; out-of-bounds writes are dropped.
    pub fn put_pixel(&mut self, x: u32, y: u32, color: Rgba8Premul) {
        if let Some(i) = self.offset(x, y) {
            self.data[i..i + 4].copy_from_slice(&color.to_array());
        }
    }

    /// Blend one pixel onto the surface; out-of-bounds writes are dropped.
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: Rgba8Premul, mode: BlendMode) {
        if let Some(i) = self.offset(x, y) {
            let dst = [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]];
            let out = composite::blend(dst, color.to_array(), mode);
            self.data[i..i + 4].copy_from_slice(&out);
        }
    }

    /// Full-surface composite of `src` onto `self` with the given mode.
    pub fn composite_over(&mut self, src: &Surface, mode: BlendMode) -> PackshotResult<()> {
        if self.width != src.width || self.height != src.height {
            return Err(PackshotError::contract(
                "composite_over expects equal-size surfaces",
            ));
        }
        for (d, s) in self
            .data
            .chunks_exact_mut(4)
            .zip(src.data.chunks_exact(4))
        {
            let out = composite::blend(
                [d[0], d[1], d[2], d[3]],
                [s[0], s[1], s[2], s[3]],
                mode,
            );
            d.copy_from_slice(&out);
        }
        Ok(())
    }

    /// Multiply every pixel (all four channels) by the stencil's coverage,
    /// keeping premultiplication intact. This is the masked half of the
    /// original's `source-in` protocol.
    pub fn apply_stencil(&mut self, stencil: &Stencil) -> PackshotResult<()> {
        if self.width != stencil.width || self.height != stencil.height {
            return Err(PackshotError::contract(
                "apply_stencil expects a stencil sized to the surface",
            ));
        }
        for (px, &a) in self
            .data
            .chunks_exact_mut(4)
            .zip(stencil.alpha.iter())
        {
            for c in px.iter_mut() {
                *c = mul_div255_u8(u16::from(*c), u16::from(a));
            }
        }
        Ok(())
    }

    /// Unpremultiplied RGBA8 copy, for PNG export.
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        for px in out.chunks_exact_mut(4) {
            let a = px[3];
            px[0] = unpremul_u8(px[0], a);
            px[1] = unpremul_u8(px[1], a);
            px[2] = unpremul_u8(px[2], a);
        }
        out
    }
}

/// Per-pixel coverage extracted from one channel of a mask image.
#[derive(Clone, Debug)]
pub struct Stencil {
    width: u32,
    height: u32,
    alpha: Vec<u8>,
}

impl Stencil {
    pub fn new(width: u32, height: u32, alpha: Vec<u8>) -> PackshotResult<Self> {
        if alpha.len() != width as usize * height as usize {
            return Err(PackshotError::contract(
                "stencil buffer length must be width * height",
            ));
        }
        Ok(Self {
            width,
            height,
            alpha,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn coverage(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.alpha[y as usize * self.width as usize + x as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_zero_size() {
        assert!(Surface::new(0, 10).is_err());
        assert!(Surface::new(10, 0).is_err());
    }

    #[test]
    fn clear_and_pixel_roundtrip() {
        let mut s = Surface::new(4, 3).unwrap();
        s.clear(Rgba8Premul::opaque(10, 20, 30));
        assert_eq!(s.pixel(3, 2).unwrap(), Rgba8Premul::opaque(10, 20, 30));
        assert!(s.pixel(4, 0).is_none());
    }

    #[test]
    fn out_of_bounds_writes_are_dropped() {
        let mut s = Surface::new(2, 2).unwrap();
        s.put_pixel(5, 5, Rgba8Premul::opaque(1, 2, 3));
        assert!(s.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn composite_over_size_mismatch_is_contract_violation() {
        let mut a = Surface::new(2, 2).unwrap();
        let b = Surface::new(3, 2).unwrap();
        assert!(matches!(
            a.composite_over(&b, BlendMode::Normal),
            Err(PackshotError::Contract(_))
        ));
    }

    #[test]
    fn composite_over_normal_covers_backdrop() {
        let mut dst = Surface::new(2, 1).unwrap();
        dst.clear(Rgba8Premul::opaque(255, 0, 0));
        let mut src = Surface::new(2, 1).unwrap();
        src.clear(Rgba8Premul::opaque(0, 0, 255));
        dst.composite_over(&src, BlendMode::Normal).unwrap();
        assert_eq!(dst.pixel(0, 0).unwrap(), Rgba8Premul::opaque(0, 0, 255));
    }

    #[test]
    fn stencil_multiplies_all_channels() {
        let mut s = Surface::new(2, 1).unwrap();
        s.clear(Rgba8Premul::opaque(200, 100, 50));
        let stencil = Stencil::new(2, 1, vec![255, 0]).unwrap();
        s.apply_stencil(&stencil).unwrap();
        assert_eq!(s.pixel(0, 0).unwrap(), Rgba8Premul::opaque(200, 100, 50));
        assert_eq!(s.pixel(1, 0).unwrap(), Rgba8Premul::transparent());
    }

    #[test]
    fn straight_rgba_unpremultiplies() {
        let mut s = Surface::new(1, 1).unwrap();
        s.put_pixel(0, 0, Rgba8Premul::from_straight_rgba(200, 100, 0, 128));
        let straight = s.to_straight_rgba();
        assert_eq!(straight[3], 128);
        assert!((i32::from(straight[0]) - 200).abs() <= 1);
        assert!((i32::from(straight[1]) - 100).abs() <= 1);
    }
}
