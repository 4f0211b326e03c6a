//! Bounding box utilities over JSON files

use super::{read_json, write_json};
use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use tracing::info;
use vision_utils_common::Size;
use vision_utils_core::PipelineConfig;
use vision_utils_detection::{
    clip_boxes, convert_boxes, nms, reverse_letterbox, scale_boxes, BoundingBox, BoxFormat,
    NmsCandidate,
};
use vision_utils_preprocess::LetterboxRecord;

fn parse_size(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let height = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
    Size::new(width, height).map_err(|e| e.to_string())
}

#[derive(Args)]
pub struct BoxInput {
    /// JSON file holding an array of [a, b, c, d] boxes
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Format of the input boxes: xyxy, xywh or cxcywh
    #[arg(long, default_value = "xyxy")]
    from: BoxFormat,

    /// Format of the output boxes
    #[arg(long, default_value = "xyxy")]
    to: BoxFormat,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl BoxInput {
    fn load(&self) -> Result<Vec<BoundingBox>> {
        let raw: Vec<[f32; 4]> = read_json(&self.input)?;
        Ok(raw
            .into_iter()
            .map(|coords| BoundingBox::new(coords, self.from))
            .collect())
    }

    fn emit(&self, boxes: &[BoundingBox]) -> Result<()> {
        let coords: Vec<[f32; 4]> = convert_boxes(boxes, self.to)
            .into_iter()
            .map(|b| b.coords)
            .collect();
        write_json(&coords, self.output.as_ref())
    }
}

#[derive(Subcommand)]
pub enum BoxesCommand {
    /// Convert between box formats
    Convert(BoxInput),

    /// Clamp boxes into an image
    Clip {
        #[command(flatten)]
        boxes: BoxInput,

        /// Image size as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        size: Size,
    },

    /// Rescale boxes between two image sizes
    Scale {
        #[command(flatten)]
        boxes: BoxInput,

        /// Size the boxes are currently in, WIDTHxHEIGHT
        #[arg(long = "from-size", value_parser = parse_size)]
        from_size: Size,

        /// Size to map them to, WIDTHxHEIGHT
        #[arg(long = "to-size", value_parser = parse_size)]
        to_size: Size,

        /// Clip to the target size
        #[arg(long)]
        clip: bool,
    },

    /// Map boxes from a letterboxed canvas back to the source image
    Reverse {
        #[command(flatten)]
        boxes: BoxInput,

        /// Letterbox record JSON captured at preprocessing time
        #[arg(long, value_name = "FILE")]
        record: PathBuf,

        /// Keep coordinates that fall outside the source image
        #[arg(long)]
        no_clip: bool,
    },

    /// Greedy non-maximum suppression over [{box, score, classIndex}]
    Nms {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(long)]
        iou_threshold: Option<f32>,

        #[arg(long)]
        score_threshold: Option<f32>,

        #[arg(long)]
        max_detections: Option<usize>,

        /// Only suppress within the same class
        #[arg(long)]
        per_class: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl BoxesCommand {
    pub fn execute(self, config: &PipelineConfig) -> Result<()> {
        match self {
            BoxesCommand::Convert(boxes) => {
                let loaded = boxes.load()?;
                boxes.emit(&loaded)
            }
            BoxesCommand::Clip { boxes, size } => {
                let loaded = boxes.load()?;
                boxes.emit(&clip_boxes(&loaded, size.width as f32, size.height as f32)?)
            }
            BoxesCommand::Scale {
                boxes,
                from_size,
                to_size,
                clip,
            } => {
                let loaded = boxes.load()?;
                boxes.emit(&scale_boxes(&loaded, from_size, to_size, clip))
            }
            BoxesCommand::Reverse {
                boxes,
                record,
                no_clip,
            } => {
                let record: LetterboxRecord = read_json(&record)?;
                let loaded = boxes.load()?;
                let mapped = reverse_letterbox(&loaded, &record, boxes.to, !no_clip)
                    .context("Reverse letterbox failed")?;
                boxes.emit(&mapped)
            }
            BoxesCommand::Nms {
                input,
                iou_threshold,
                score_threshold,
                max_detections,
                per_class,
                output,
            } => {
                let candidates: Vec<NmsCandidate> = read_json(&input)?;
                let mut nms_config = config.nms;
                if let Some(iou) = iou_threshold {
                    nms_config.iou_threshold = iou;
                }
                if let Some(score) = score_threshold {
                    nms_config.score_threshold = score;
                }
                if let Some(max) = max_detections {
                    nms_config.max_detections = max;
                }
                nms_config.per_class |= per_class;

                let result = nms(&candidates, &nms_config).context("NMS failed")?;
                info!("NMS kept {} of {}", result.total_after, result.total_before);
                write_json(&result, output.as_ref())
            }
        }
    }
}
