use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use super::{ElevationRaster, ElevationSampler, SampleGrid};
use crate::error::ElevationError;

/// Coordinates are normalized to 1e-7 degrees (about 1 cm) before hashing
const COORD_QUANTUM: f64 = 1e7;

/// Content address of an elevation request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: String,
    pub rows: usize,
    pub cols: usize,
    pub zoom: u8,
    pub digest: u64,
}

impl CacheKey {
    pub fn for_request(source: &str, grid: &SampleGrid, zoom: u8) -> Self {
        let mut hasher = DefaultHasher::new();
        for &(lat, lon) in &grid.points {
            ((lat * COORD_QUANTUM).round() as i64).hash(&mut hasher);
            ((lon * COORD_QUANTUM).round() as i64).hash(&mut hasher);
        }
        Self {
            source: source.to_string(),
            rows: grid.rows,
            cols: grid.cols,
            zoom,
            digest: hasher.finish(),
        }
    }
}

/// Storage for previously sampled rasters
pub trait ElevationCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Arc<ElevationRaster>>;
    fn put(&self, key: CacheKey, raster: Arc<ElevationRaster>);
}

/// In-process cache shared by every zone of a session
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, Arc<ElevationRaster>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ElevationCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<ElevationRaster>> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn put(&self, key: CacheKey, raster: Arc<ElevationRaster>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, raster);
        }
    }
}

/// Sampler decorator that consults a cache before delegating
pub struct CachedSampler<S, C> {
    inner: S,
    cache: C,
}

impl<S: ElevationSampler, C: ElevationCache> CachedSampler<S, C> {
    pub fn new(inner: S, cache: C) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }
}

impl<S: ElevationSampler, C: ElevationCache> ElevationSampler for CachedSampler<S, C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn sample(&self, grid: &SampleGrid, zoom: u8) -> Result<ElevationRaster, ElevationError> {
        let key = CacheKey::for_request(self.inner.name(), grid, zoom);
        if let Some(hit) = self.cache.get(&key) {
            log::debug!(
                "Elevation cache hit for {}x{} grid ({})",
                grid.rows,
                grid.cols,
                key.source
            );
            return Ok((*hit).clone());
        }
        let raster = self.inner.sample(grid, zoom)?;
        self.cache.put(key, Arc::new(raster.clone()));
        Ok(raster)
    }
}
