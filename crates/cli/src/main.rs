use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use facetrack_core::detection::domain::face_detector::{DetectError, DetectorFactory, FaceDetector};
use facetrack_core::detection::infrastructure::model_resolver;
use facetrack_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use facetrack_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use facetrack_core::pipeline::infrastructure::json_lines_sink::JsonLinesSink;
use facetrack_core::pipeline::infrastructure::sequential_pipeline_executor::SequentialPipelineExecutor;
use facetrack_core::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
use facetrack_core::pipeline::pipeline_executor::PipelineExecutor;
use facetrack_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facetrack_core::pipeline::presence_heatmap::PresenceHeatmap;
use facetrack_core::pipeline::result_sink::ResultSink;
use facetrack_core::pipeline::track_faces_use_case::TrackFacesUseCase;
use facetrack_core::shared::constants::{BLAZEFACE_MODEL_NAME, DEFAULT_SEQUENCE_FPS, YOLO_MODEL_NAME};
use facetrack_core::shared::settings::{FrameDropPolicy, PipelineSettings};
use facetrack_core::video::domain::frame_source::FrameSource;
use facetrack_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use facetrack_core::video::infrastructure::image_sequence_source::{is_image, ImageSequenceSource};

const HOTTEST_CELLS_SHOWN: usize = 5;

/// Face detection and tracking for videos, streams and image sequences.
///
/// Writes one JSON object per frame with the faces being tracked.
#[derive(Parser)]
#[command(name = "facetrack")]
struct Cli {
    /// Input video file, stream URL, capture device, image, or directory of images.
    input: PathBuf,

    /// Output JSON-lines file (default: stdout).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Detector model file (default: looked up in the model cache directory).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Detector backend: yolo or blazeface.
    #[arg(long, default_value = "yolo")]
    detector: String,

    /// Settings file (default: the platform config directory, if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// IoU above which overlapping detections are suppressed (0.0-1.0).
    #[arg(long)]
    iou: Option<f64>,

    /// Number of detector workers.
    #[arg(long)]
    workers: Option<usize>,

    /// Frames that may wait for a free detector.
    #[arg(long)]
    queue: Option<usize>,

    /// What to do when the queue is full: block, drop_oldest or drop_newest.
    #[arg(long)]
    drop_policy: Option<String>,

    /// Frame rate assigned to image sequences.
    #[arg(long)]
    fps: Option<f64>,

    /// Run every stage on one thread.
    #[arg(long)]
    sequential: bool,

    /// Write a presence heatmap of confirmed faces as JSON.
    #[arg(long)]
    heatmap: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings = build_settings(&cli)?;
    let source = open_source(&cli)?;
    let detectors = build_detector_factory(&cli)?;
    let executor: Box<dyn PipelineExecutor> = if cli.sequential {
        Box::new(SequentialPipelineExecutor::new())
    } else {
        Box::new(ThreadedPipelineExecutor::new())
    };

    let mut use_case = TrackFacesUseCase::new(
        source,
        detectors,
        executor,
        &settings,
        Some(Box::new(StdoutPipelineLogger::default())),
        None,
    )?;

    let mut results: Box<dyn ResultSink> = match &cli.output {
        Some(path) => Box::new(JsonLinesSink::create(path)?),
        None => Box::new(JsonLinesSink::new(BufWriter::new(io::stdout()))),
    };

    let report = match &cli.heatmap {
        Some(path) => {
            let mut heatmap = PresenceHeatmap::default();
            let report = use_case.execute(&mut (results.as_mut(), &mut heatmap))?;
            heatmap.save(path)?;
            for cell in heatmap.hottest(HOTTEST_CELLS_SHOWN) {
                log::info!("Busy zone row {} col {}: {} sightings", cell.row, cell.col, cell.count);
            }
            log::info!("Heatmap written to {}", path.display());
            report
        }
        None => use_case.execute(results.as_mut())?,
    };

    if let Some(path) = &cli.output {
        log::info!("Results written to {}", path.display());
    }
    eprintln!("{report}");
    Ok(())
}

fn build_settings(cli: &Cli) -> Result<PipelineSettings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => PipelineSettings::load(path)?,
        None => PipelineSettings::load_or_default(),
    };
    if let Some(confidence) = cli.confidence {
        settings.confidence_threshold = confidence;
    }
    if let Some(iou) = cli.iou {
        settings.iou_threshold = iou;
    }
    if let Some(workers) = cli.workers {
        settings.worker_pool_size = workers;
    }
    if let Some(queue) = cli.queue {
        settings.queue_capacity = queue;
    }
    if let Some(policy) = &cli.drop_policy {
        settings.frame_drop_policy = policy.parse::<FrameDropPolicy>()?;
    }
    settings.validate()?;
    Ok(settings)
}

fn open_source(cli: &Cli) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    if cli.input.is_dir() || is_image(&cli.input) {
        let fps = cli.fps.unwrap_or(DEFAULT_SEQUENCE_FPS);
        let source = ImageSequenceSource::open_with_fps(&cli.input, fps)?;
        log::info!(
            "Opened {} image(s) from {}",
            source.metadata().total_frames.unwrap_or(0),
            cli.input.display()
        );
        Ok(Box::new(source))
    } else {
        let source = FfmpegFrameSource::open(&cli.input)?;
        let meta = source.metadata();
        log::info!(
            "Opened {} ({}x{} @ {:.2} fps, {})",
            cli.input.display(),
            meta.width,
            meta.height,
            meta.fps,
            meta.codec
        );
        Ok(Box::new(source))
    }
}

fn build_detector_factory(cli: &Cli) -> Result<Box<dyn DetectorFactory>, Box<dyn std::error::Error>> {
    let name = match cli.detector.as_str() {
        "blazeface" => BLAZEFACE_MODEL_NAME,
        _ => YOLO_MODEL_NAME,
    };
    let model_path = model_resolver::resolve(name, cli.model.as_deref(), None)?;
    log::info!("Using model {}", model_path.display());

    // One session per worker; sessions are not shared between threads
    let factory: Box<dyn DetectorFactory> = if cli.detector == "blazeface" {
        Box::new(move || -> Result<Box<dyn FaceDetector>, DetectError> {
            Ok(Box::new(OnnxBlazefaceDetector::new(&model_path)?))
        })
    } else {
        Box::new(move || -> Result<Box<dyn FaceDetector>, DetectError> {
            Ok(Box::new(OnnxYoloDetector::new(&model_path)?))
        })
    };
    Ok(factory)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !looks_like_url(&cli.input) && !cli.input.exists() {
        return Err(format!("Input not found: {}", cli.input.display()).into());
    }
    if cli.detector != "yolo" && cli.detector != "blazeface" {
        return Err(format!(
            "Detector must be 'yolo' or 'blazeface', got '{}'",
            cli.detector
        )
        .into());
    }
    if let Some(fps) = cli.fps {
        if !(fps > 0.0 && fps.is_finite()) {
            return Err(format!("FPS must be a positive number, got {fps}").into());
        }
    }
    if let (Some(output), Some(heatmap)) = (&cli.output, &cli.heatmap) {
        if output == heatmap {
            return Err("--output and --heatmap must be different files".into());
        }
    }
    Ok(())
}

fn looks_like_url(input: &Path) -> bool {
    input.to_str().is_some_and(|s| s.contains("://"))
}
