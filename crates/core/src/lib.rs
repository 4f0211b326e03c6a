//! Batch orchestration for the vision-utils pipeline
//!
//! Configuration loading, the bounded LRU result cache and the parallel
//! batch executor. The per-image work itself lives in
//! `vision-utils-preprocess`.

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;

pub use cache::{CacheKey, CacheStats, ResultCache};
pub use config::{BatchConfig, PipelineConfig, THREADS_ENV};
pub use error::{BatchError, ConfigError};
pub use executor::{
    batch_get_pixel_data, BatchExecutor, BatchItem, BatchResult, ItemError, ItemResult,
};
