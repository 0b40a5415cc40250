use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    assets::decode::decode_image,
    foundation::error::{PackshotError, PackshotResult},
};

/// Prepared raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
}

/// Normalize and validate packshot-relative asset paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and
/// rejects absolute paths or parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> PackshotResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(PackshotError::validation("asset paths must be relative"));
    }
    if s.is_empty() {
        return Err(PackshotError::validation("asset path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(PackshotError::validation("asset paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(PackshotError::validation(
            "asset path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}

/// Directory that packshot-relative image sources resolve against.
#[derive(Clone, Debug)]
pub struct AssetRoot {
    root: PathBuf,
}

impl AssetRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read and decode one image. All failures surface as recoverable
    /// `ResourceLoad` errors except path-shape problems (`Validation`).
    pub fn load_image(&self, source: &str) -> PackshotResult<PreparedImage> {
        let rel = normalize_rel_path(source)?;
        let path = self.root.join(&rel);
        let bytes = std::fs::read(&path).map_err(|e| {
            PackshotError::resource_load(format!("read '{}': {e}", path.display()))
        })?;
        decode_image(&bytes)
            .map_err(|e| PackshotError::resource_load(format!("'{rel}': {e}")))
    }
}

#[derive(Clone, Debug, Default)]
enum CacheSlot {
    /// No request seen yet. Rendering in this state is a contract violation.
    #[default]
    Empty,
    /// Requested with no image configured; renderers fall back to placeholder.
    NoSource,
    Loaded(PreparedImage),
    /// The last load failed; renderers degrade, siblings are unaffected.
    Failed,
}

/// Per-renderer image cache keyed by the latest requested source.
///
/// `request` is idempotent for an unchanged source (no redundant IO); a
/// changed source supersedes the previous result, which is discarded — the
/// cache never serves pixels for a source that is no longer configured.
#[derive(Debug, Default)]
pub struct ImageCache {
    source: Option<String>,
    slot: CacheSlot,
    generation: u64,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the configured source, loading only when it changed since the
    /// last request. Returns the load error (already recorded as `Failed`) so
    /// callers can collect it; the cache itself stays usable.
    pub fn request(&mut self, source: Option<&str>, assets: &AssetRoot) -> PackshotResult<()> {
        let unchanged =
            self.source.as_deref() == source && !matches!(self.slot, CacheSlot::Empty);
        if unchanged {
            return Ok(());
        }

        self.source = source.map(str::to_string);
        self.generation += 1;

        let Some(source) = source else {
            self.slot = CacheSlot::NoSource;
            return Ok(());
        };

        match assets.load_image(source) {
            Ok(img) => {
                self.slot = CacheSlot::Loaded(img);
                Ok(())
            }
            Err(e) => {
                self.slot = CacheSlot::Failed;
                Err(e)
            }
        }
    }

    /// Image for the currently configured source, if a load completed.
    ///
    /// `Failed` and no-source slots yield `Ok(None)` (placeholder path). An
    /// `Empty` slot with `required` is a contract violation: render was called
    /// before load.
    pub fn image(&self, required: bool) -> PackshotResult<Option<&PreparedImage>> {
        match &self.slot {
            CacheSlot::Loaded(img) => Ok(Some(img)),
            CacheSlot::NoSource | CacheSlot::Failed => Ok(None),
            CacheSlot::Empty => {
                if required {
                    Err(PackshotError::contract(
                        "image requested before load completed",
                    ))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Bumps whenever a request settles with a different source, so derived
    /// data (e.g. a mask stencil) can detect staleness cheaply.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn clear(&mut self) {
        self.source = None;
        self.slot = CacheSlot::Empty;
    }
}
