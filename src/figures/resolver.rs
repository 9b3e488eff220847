//! Maps `{{figureN.M}}` placeholders to registered image payloads.
//!
//! Lookup is exact on the placeholder id first; failing that, the `M`-th
//! asset registered for chapter `N` is used. The positional fallback covers
//! uploads that were registered before the author settled on numbering.
//! Every failure mode (no asset, unreadable payload, timeout, undecodable
//! image) resolves to [`Resolution::Missing`].

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use super::ImageAsset;
use crate::markdown::FigureRef;
use crate::projects::{ExportSettings, Project, ProjectLayout};

/// Where figure payload bytes come from.
pub trait AssetSource: Send + Sync {
    fn fetch(&self, asset: &ImageAsset) -> Result<Vec<u8>>;
}

/// Reads payloads from a project's figure directory.
pub struct FileAssetSource {
    root: PathBuf,
}

impl FileAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn for_project(project: &Project) -> Self {
        Self::new(ProjectLayout::new(project).figures_dir)
    }
}

impl AssetSource for FileAssetSource {
    fn fetch(&self, asset: &ImageAsset) -> Result<Vec<u8>> {
        let path = self.root.join(&asset.source);
        fs::read(&path).with_context(|| format!("Failed to read figure {}", path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub asset: ImageAsset,
    pub bytes: Arc<Vec<u8>>,
    pub content_type: String,
    /// File extension matching the detected format.
    pub extension: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Found(ResolvedImage),
    Missing,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }
}

type CachedPayload = Option<Arc<Vec<u8>>>;

pub struct ImageResolver {
    assets: Vec<ImageAsset>,
    source: Arc<dyn AssetSource>,
    timeout: Duration,
    max_parallel: usize,
    cache: Mutex<HashMap<String, CachedPayload>>,
}

impl ImageResolver {
    /// `assets` must be in registration order for the positional fallback.
    pub fn new(assets: Vec<ImageAsset>, source: Arc<dyn AssetSource>) -> Self {
        Self::with_settings(assets, source, &ExportSettings::default())
    }

    pub fn with_settings(
        assets: Vec<ImageAsset>,
        source: Arc<dyn AssetSource>,
        settings: &ExportSettings,
    ) -> Self {
        Self {
            assets,
            source,
            timeout: Duration::from_millis(settings.image_fetch_timeout_ms.max(1)),
            max_parallel: settings.max_parallel_image_fetches.max(1) as usize,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn lookup(&self, figure: FigureRef) -> Option<&ImageAsset> {
        let id = figure.placeholder_id();
        if let Some(asset) = self.assets.iter().find(|asset| asset.placeholder_id == id) {
            return Some(asset);
        }
        let index = figure.figure.checked_sub(1)? as usize;
        self.assets
            .iter()
            .filter(|asset| asset.chapter_number == figure.chapter)
            .nth(index)
    }

    pub fn resolve(&self, figure: FigureRef) -> Resolution {
        let Some(asset) = self.lookup(figure) else {
            log::warn!("no image registered for figure {figure}");
            return Resolution::Missing;
        };
        let payload = match self.cached(&asset.source) {
            Some(payload) => payload,
            None => {
                let payload = self.load_payload(asset);
                self.remember(&asset.source, payload.clone());
                payload
            }
        };
        match payload {
            Some(bytes) => decode(asset, bytes, figure),
            None => Resolution::Missing,
        }
    }

    /// Resolves every figure, fetching distinct payloads on a bounded pool.
    /// Results follow the order of `figures`.
    pub fn resolve_all(&self, figures: &[FigureRef]) -> Result<Vec<Resolution>> {
        let mut pending: Vec<&ImageAsset> = Vec::new();
        for figure in figures {
            if let Some(asset) = self.lookup(*figure) {
                let known = self.cached(&asset.source).is_some()
                    || pending.iter().any(|queued| queued.source == asset.source);
                if !known {
                    pending.push(asset);
                }
            }
        }

        if !pending.is_empty() {
            let pool = ThreadPoolBuilder::new()
                .num_threads(self.max_parallel.min(pending.len()))
                .build()
                .context("Failed to configure image fetch thread pool")?;
            let fetched = pool.install(|| {
                pending
                    .par_iter()
                    .map(|asset| (asset.source.clone(), self.load_payload(asset)))
                    .collect::<Vec<_>>()
            });
            for (key, payload) in fetched {
                self.remember(&key, payload);
            }
        }

        Ok(figures.iter().map(|figure| self.resolve(*figure)).collect())
    }

    fn cached(&self, key: &str) -> Option<CachedPayload> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(key).cloned())
    }

    fn remember(&self, key: &str, payload: CachedPayload) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key.to_string(), payload);
        }
    }

    fn load_payload(&self, asset: &ImageAsset) -> CachedPayload {
        match self.fetch_with_timeout(asset) {
            Ok(bytes) => Some(Arc::new(bytes)),
            Err(err) => {
                log::warn!("figure {} unavailable: {err:#}", asset.placeholder_id);
                None
            }
        }
    }

    fn fetch_with_timeout(&self, asset: &ImageAsset) -> Result<Vec<u8>> {
        let (tx, rx) = mpsc::channel();
        let source = Arc::clone(&self.source);
        let owned = asset.clone();
        thread::Builder::new()
            .name(format!("fetch-{}", asset.placeholder_id))
            .spawn(move || {
                let _ = tx.send(source.fetch(&owned));
            })
            .context("Failed to spawn image fetch thread")?;
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                bail!("fetch of {} timed out after {:?}", asset.source, self.timeout)
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("fetch of {} aborted", asset.source))
            }
        }
    }
}

fn decode(asset: &ImageAsset, bytes: Arc<Vec<u8>>, figure: FigureRef) -> Resolution {
    let probe = || -> Result<(image::ImageFormat, u32, u32)> {
        let reader = image::ImageReader::new(Cursor::new(bytes.as_slice())).with_guessed_format()?;
        let format = reader
            .format()
            .context("unrecognised image format")?;
        let (width, height) = reader.into_dimensions()?;
        Ok((format, width, height))
    };
    match probe() {
        Ok((format, width, height)) => Resolution::Found(ResolvedImage {
            asset: asset.clone(),
            content_type: format.to_mime_type().to_string(),
            extension: format
                .extensions_str()
                .first()
                .copied()
                .unwrap_or("bin")
                .to_string(),
            bytes,
            width,
            height,
        }),
        Err(err) => {
            log::warn!("figure {figure} has an undecodable payload: {err:#}");
            Resolution::Missing
        }
    }
}
