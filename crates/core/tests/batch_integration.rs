// Config file -> executor -> batch of letterboxed tensors

use image::{Rgba, RgbaImage};
use std::io::Write;
use vision_utils_common::DataLayout;
use vision_utils_core::{BatchExecutor, BatchItem, PipelineConfig, ResultCache};
use vision_utils_preprocess::{concatenate_to_batch, PixelDataResult};

fn gradient(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    })
}

fn yolo_config() -> PipelineConfig {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(
        br#"
pixel:
  resize:
    width: 64
    height: 64
    strategy: letterbox
  data_layout: chw
batch:
  max_concurrency: 2
  cache_capacity: 4
"#,
    )
    .unwrap();
    PipelineConfig::from_file(file.path()).unwrap()
}

#[test]
fn test_config_driven_batch() {
    let config = yolo_config();
    let executor = BatchExecutor::from_config(&config);
    assert_eq!(executor.max_concurrency(), config.batch.max_concurrency);

    let items = vec![
        BatchItem::new("wide.png", gradient(128, 64)),
        BatchItem::new("tall.png", gradient(32, 96)),
        BatchItem::new("square.png", gradient(50, 50)),
    ];
    let out = executor.run(&items).unwrap();
    assert_eq!(out.succeeded, 3);

    let tensors: Vec<PixelDataResult> = out
        .results
        .into_iter()
        .map(|r| r.result.unwrap())
        .collect();
    for tensor in &tensors {
        assert_eq!(tensor.shape, vec![3, 64, 64]);
        assert!(tensor.letterbox.is_some());
    }
    assert_eq!(tensors[0].letterbox.unwrap().offset, (0.0, 16.0));

    let batch = concatenate_to_batch(&tensors).unwrap();
    assert_eq!(batch.data_layout, DataLayout::Nchw);
    assert_eq!(batch.shape, vec![3, 3, 64, 64]);
}

#[test]
fn test_cache_shared_between_executors() {
    let config = yolo_config();
    let cache = ResultCache::new(config.batch.cache_capacity);
    let first = BatchExecutor::from_config(&config).with_cache(cache.clone());
    let second = BatchExecutor::from_config(&config).with_cache(cache.clone());

    let items = vec![BatchItem::new("frame-0001.png", gradient(40, 30))];
    first.run(&items).unwrap();
    let out = second.run(&items).unwrap();
    assert!(out.results[0].cached);
    assert_eq!(cache.stats().hits, 1);

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_batch_result_json() {
    let config = yolo_config();
    let items = vec![BatchItem::new("a.png", gradient(8, 8))];
    let out = BatchExecutor::from_config(&config).run(&items).unwrap();
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["succeeded"], 1);
    assert_eq!(json["results"][0]["id"], "a.png");
    assert_eq!(json["results"][0]["result"]["Ok"]["dataLayout"], "chw");
    assert_eq!(json["cacheStats"]["capacity"], 4);
}
