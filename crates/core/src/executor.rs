//! Batch executor - runs the pixel pipeline over many sources in parallel
//!
//! Each worker owns its buffers and writes into its own pre-sized result slot.
//! A failing item becomes an error record in place; the rest of the batch
//! carries on.

use crate::cache::{CacheKey, CacheStats, ResultCache};
use crate::config::{BatchConfig, PipelineConfig};
use crate::error::BatchError;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};
use vision_utils_common::{PixelSource, VisionError};
use vision_utils_preprocess::{get_pixel_data, PixelDataOptions, PixelDataResult};

/// One source in a batch
#[derive(Debug, Clone)]
pub struct BatchItem<S> {
    /// Source identity (path, URL). Used for the cache key and in reports.
    pub id: String,
    pub source: S,
    /// Overrides the executor options for this item
    pub options: Option<PixelDataOptions>,
}

impl<S> BatchItem<S> {
    pub fn new(id: impl Into<String>, source: S) -> Self {
        Self {
            id: id.into(),
            source,
            options: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: PixelDataOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Serializable record of a failed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    /// Error category: `InvalidInput`, `OutOfBounds`, `DimensionMismatch`,
    /// `UnsupportedFormat` or `Image`
    pub kind: String,
    pub message: String,
}

impl From<&VisionError> for ItemError {
    fn from(err: &VisionError) -> Self {
        let kind = match err {
            VisionError::InvalidInput(_) => "InvalidInput",
            VisionError::OutOfBounds(_) => "OutOfBounds",
            VisionError::DimensionMismatch(_) => "DimensionMismatch",
            VisionError::UnsupportedFormat(_) => "UnsupportedFormat",
            VisionError::Image(_) => "Image",
        };
        Self {
            kind: kind.to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcome for one batch slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub index: usize,
    pub id: String,
    pub result: Result<PixelDataResult, ItemError>,
    /// Served from the result cache
    pub cached: bool,
    pub elapsed_ms: f64,
}

impl ItemResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// One entry per input, in input order
    pub results: Vec<ItemResult>,
    pub total_time_ms: f64,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_stats: Option<CacheStats>,
}

/// Runs [`get_pixel_data`] over a batch on a bounded rayon pool
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    options: PixelDataOptions,
    max_concurrency: usize,
    cache: Option<ResultCache<PixelDataResult>>,
}

impl BatchExecutor {
    /// Executor with one worker per CPU and no cache
    pub fn new(options: PixelDataOptions) -> Self {
        Self {
            options,
            max_concurrency: num_cpus::get(),
            cache: None,
        }
    }

    /// Executor built from the `pixel` and `batch` sections of a config
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.pixel.clone()).with_batch_config(&config.batch)
    }

    #[must_use]
    pub fn with_batch_config(mut self, batch: &BatchConfig) -> Self {
        self.max_concurrency = batch.max_concurrency;
        self.cache = (batch.cache_capacity > 0).then(|| ResultCache::new(batch.cache_capacity));
        self
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Share a caller-owned cache with this executor
    #[must_use]
    pub fn with_cache(mut self, cache: ResultCache<PixelDataResult>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn options(&self) -> &PixelDataOptions {
        &self.options
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn cache(&self) -> Option<&ResultCache<PixelDataResult>> {
        self.cache.as_ref()
    }

    /// Process every item. Only pool construction can fail; per-item errors
    /// are reported in the matching slot.
    pub fn run<S: PixelSource + Sync>(
        &self,
        items: &[BatchItem<S>],
    ) -> Result<BatchResult, BatchError> {
        if self.max_concurrency == 0 {
            return Err(BatchError::Invalid(
                "max_concurrency must be positive".to_string(),
            ));
        }

        let start = Instant::now();
        info!("=== Batch Started ===");
        info!("Items: {}", items.len());
        info!("Max concurrency: {}", self.max_concurrency);
        match &self.cache {
            Some(cache) => info!("Cache: enabled (capacity {})", cache.capacity()),
            None => info!("Cache: disabled"),
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.max_concurrency)
            .thread_name(|i| format!("vision-batch-{i}"))
            .build()?;

        let mut slots: Vec<Option<ItemResult>> = vec![None; items.len()];
        pool.install(|| {
            slots
                .par_iter_mut()
                .zip(items.par_iter())
                .enumerate()
                .for_each(|(index, (slot, item))| {
                    *slot = Some(self.process_item(index, item));
                });
        });

        let results: Vec<ItemResult> = slots.into_iter().flatten().collect();
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let failed = results.len() - succeeded;
        let total_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        info!("=== Batch Completed ===");
        info!(
            "Succeeded: {}, failed: {}, total time: {:.2}ms",
            succeeded, failed, total_time_ms
        );

        Ok(BatchResult {
            results,
            total_time_ms,
            succeeded,
            failed,
            cache_stats: self.cache.as_ref().map(ResultCache::stats),
        })
    }

    fn process_item<S: PixelSource>(&self, index: usize, item: &BatchItem<S>) -> ItemResult {
        let start = Instant::now();
        let options = item.options.as_ref().unwrap_or(&self.options);

        let key = self.cache.as_ref().and_then(|_| {
            CacheKey::for_options(item.id.as_bytes(), options)
                .map_err(|e| warn!("Cache key for {} unavailable: {}", item.id, e))
                .ok()
        });

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key) {
                debug!("Cache hit for {}", item.id);
                return ItemResult {
                    index,
                    id: item.id.clone(),
                    result: Ok(hit),
                    cached: true,
                    elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
                };
            }
        }

        let result = match get_pixel_data(&item.source, options) {
            Ok(output) => {
                if let (Some(cache), Some(key)) = (&self.cache, key) {
                    cache.put(key, output.clone());
                }
                Ok(output)
            }
            Err(e) => {
                warn!("Item {} ({}) failed: {}", index, item.id, e);
                Err(ItemError::from(&e))
            }
        };

        ItemResult {
            index,
            id: item.id.clone(),
            result,
            cached: false,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

/// Run the pipeline over `items` with shared `options` and batch settings.
///
/// A fresh cache sized by `batch.cache_capacity` lives for this call only;
/// hold a [`BatchExecutor`] to reuse one across batches.
pub fn batch_get_pixel_data<S: PixelSource + Sync>(
    items: &[BatchItem<S>],
    options: &PixelDataOptions,
    batch: &BatchConfig,
) -> Result<BatchResult, BatchError> {
    BatchExecutor::new(options.clone())
        .with_batch_config(batch)
        .run(items)
}
