use core::fmt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::error::TextureError;

use super::{GpuContext, GpuTexture};

// ── handle ────────────────────────────────────────────────────────────────

struct TextureInner {
    gpu: GpuTexture,
    width: u32,
    height: u32,
    url: Option<String>,
    release: flume::Sender<GpuTexture>,
}

impl Drop for TextureInner {
    fn drop(&mut self) {
        // The renderer may already be gone; then the GPU context went with it.
        let _ = self.release.send(self.gpu);
    }
}

/// Shared, reference-counted GPU texture.
///
/// Clones are cheap. When the last clone is dropped the texture is queued for
/// release and freed by the renderer at the start of its next frame.
#[derive(Clone)]
pub struct TextureHandle {
    inner: Arc<TextureInner>,
}

impl TextureHandle {
    pub(crate) fn new(
        gpu: GpuTexture,
        width: u32,
        height: u32,
        url: Option<String>,
        release: flume::Sender<GpuTexture>,
    ) -> Self {
        Self {
            inner: Arc::new(TextureInner {
                gpu,
                width,
                height,
                url,
                release,
            }),
        }
    }

    #[inline]
    pub fn gpu(&self) -> GpuTexture {
        self.inner.gpu
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.inner.width, self.inner.height)
    }

    /// URL the texture was loaded from; `None` for generated textures.
    pub fn url(&self) -> Option<&str> {
        self.inner.url.as_deref()
    }

    /// Number of live clones.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn ptr_eq(&self, other: &TextureHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for TextureHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureHandle")
            .field("gpu", &self.inner.gpu)
            .field("size", &(self.inner.width, self.inner.height))
            .field("url", &self.inner.url)
            .finish()
    }
}

// ── fetching ──────────────────────────────────────────────────────────────

/// Produces the encoded bytes behind a texture URL.
pub trait TextureFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<Vec<u8>, TextureError>>;
}

/// Resolves URLs as file paths relative to `root`.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    pub root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TextureFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<Vec<u8>, TextureError>> {
        let path = self.root.join(url.trim_start_matches("file://"));
        let url = url.to_owned();
        async move {
            std::fs::read(&path).map_err(|e| TextureError::Fetch {
                url,
                reason: format!("{}: {e}", path.display()),
            })
        }
        .boxed()
    }
}

/// Decodes an encoded image (PNG, JPEG, BMP) into tightly packed RGBA8.
pub fn decode_rgba8(url: &str, bytes: &[u8]) -> Result<(Vec<u8>, u32, u32), TextureError> {
    let img = image::load_from_memory(bytes).map_err(|e| TextureError::Decode {
        url: url.to_owned(),
        reason: e.to_string(),
    })?;
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    Ok((rgba.into_raw(), w, h))
}

// ── cache ─────────────────────────────────────────────────────────────────

type LoadFuture = Shared<BoxFuture<'static, Result<TextureHandle, TextureError>>>;

enum Entry {
    Pending(LoadFuture),
    Ready(TextureHandle),
}

struct CacheInner<G> {
    gpu: Arc<Mutex<G>>,
    fetcher: Arc<dyn TextureFetcher>,
    release: flume::Sender<GpuTexture>,
    entries: Mutex<HashMap<String, Entry>>,
}

/// URL-keyed texture cache.
///
/// - entries never expire; only [`invalidate`](Self::invalidate) and
///   [`purge_unreferenced`](Self::purge_unreferenced) drop them
/// - concurrent loads of one URL share a single fetch, decode and upload
/// - failed loads are not cached, so a later call retries
///
/// Loading happens on whatever executor polls the returned future; the render
/// loop never waits on it.
pub struct TextureCache<G: GpuContext> {
    inner: Arc<CacheInner<G>>,
}

impl<G: GpuContext> Clone for TextureCache<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: GpuContext + 'static> TextureCache<G> {
    pub(crate) fn new(
        gpu: Arc<Mutex<G>>,
        fetcher: Arc<dyn TextureFetcher>,
        release: flume::Sender<GpuTexture>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                gpu,
                fetcher,
                release,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the texture for `url`, loading it on first use.
    pub async fn load(&self, url: &str) -> Result<TextureHandle, TextureError> {
        let pending = {
            let mut entries = self.inner.entries.lock();
            match entries.get(url) {
                Some(Entry::Ready(handle)) => {
                    log::debug!("texture cache hit: {url}");
                    return Ok(handle.clone());
                }
                Some(Entry::Pending(fut)) => {
                    log::debug!("texture cache: joining in-flight load of {url}");
                    fut.clone()
                }
                None => {
                    log::debug!("texture cache miss: {url}");
                    let fut = self.start_load(url);
                    entries.insert(url.to_owned(), Entry::Pending(fut.clone()));
                    fut
                }
            }
        };

        let result = pending.await;
        self.settle(url, &result);
        result
    }

    fn start_load(&self, url: &str) -> LoadFuture {
        let url = url.to_owned();
        let fetch = self.inner.fetcher.fetch(&url);
        let gpu = Arc::clone(&self.inner.gpu);
        let release = self.inner.release.clone();

        async move {
            let bytes = fetch.await?;
            let (pixels, w, h) = decode_rgba8(&url, &bytes)?;
            let texture = gpu
                .lock()
                .upload_texture(&pixels, w, h)
                .map_err(|source| TextureError::Upload {
                    url: url.clone(),
                    source,
                })?;
            log::debug!("texture uploaded: {url} ({w}x{h}) as {texture}");
            Ok(TextureHandle::new(texture, w, h, Some(url), release))
        }
        .boxed()
        .shared()
    }

    /// Moves a finished load out of the pending state.
    fn settle(&self, url: &str, result: &Result<TextureHandle, TextureError>) {
        let mut entries = self.inner.entries.lock();
        if !matches!(entries.get(url), Some(Entry::Pending(_))) {
            return;
        }
        match result {
            Ok(handle) => {
                entries.insert(url.to_owned(), Entry::Ready(handle.clone()));
            }
            Err(e) => {
                log::warn!("texture load failed: {e}");
                entries.remove(url);
            }
        }
    }

    /// The cached handle for `url`, if loaded.
    pub fn get(&self, url: &str) -> Option<TextureHandle> {
        match self.inner.entries.lock().get(url) {
            Some(Entry::Ready(h)) => Some(h.clone()),
            _ => None,
        }
    }

    /// Registers an already uploaded texture under `url`.
    pub fn insert(&self, url: impl Into<String>, handle: TextureHandle) {
        self.inner.entries.lock().insert(url.into(), Entry::Ready(handle));
    }

    pub fn contains(&self, url: &str) -> bool {
        self.inner.entries.lock().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the cache's reference to `url`. Sprites keep theirs.
    pub fn invalidate(&self, url: &str) -> bool {
        self.inner.entries.lock().remove(url).is_some()
    }

    /// Drops every loaded entry that nothing outside the cache references.
    /// Returns how many were dropped.
    pub fn purge_unreferenced(&self) -> usize {
        let mut entries = self.inner.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| match e {
            Entry::Ready(h) => h.ref_count() > 1,
            Entry::Pending(_) => true,
        });
        before - entries.len()
    }
}
