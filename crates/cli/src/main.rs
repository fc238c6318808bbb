use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::Parser;

use facecam_core::capture::capture_session::{CaptureSession, VideoDataOutput};
use facecam_core::capture::domain::video_device::VideoDevice;
use facecam_core::capture::infrastructure::ffmpeg_camera_device::FfmpegCameraDevice;
use facecam_core::capture::infrastructure::image_sequence_device::ImageSequenceDevice;
use facecam_core::detection::domain::face_detector::FaceDetector;
use facecam_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use facecam_core::orientation::domain::device_orientation::{CameraPosition, DeviceOrientation};
use facecam_core::orientation::domain::orientation_source::OrientationSource;
use facecam_core::orientation::infrastructure::shared_orientation::FixedOrientation;
use facecam_core::pipeline::detection_dispatcher::DetectionDispatcher;
use facecam_core::pipeline::main_queue::{main_queue, MainLoop};
use facecam_core::pipeline::pipeline_logger::{PipelineLogger, StdoutPipelineLogger};
use facecam_core::rendering::infrastructure::image_file_writer::ImageFileWriter;
use facecam_core::rendering::infrastructure::image_overlay_surface::ImageOverlaySurface;
use facecam_core::rendering::preview_renderer::PreviewRenderer;
use facecam_core::shared::constants::{BLAZEFACE_MODEL_NAME, OVERLAY_THICKNESS};
use facecam_core::shared::model_resolver::{ModelResolveError, ModelResolver, ProgressFn};
use facecam_core::shared::settings::Settings;

/// How long the main loop waits for results before refreshing the preview.
const MAIN_LOOP_TICK: Duration = Duration::from_millis(15);

type Renderer = PreviewRenderer<ImageOverlaySurface>;

/// Live face detection with bounding-box overlays.
#[derive(Parser)]
#[command(name = "facecam")]
struct Cli {
    /// Capture device URL or path (default: the platform's first camera).
    #[arg(long)]
    device: Option<String>,

    /// Capture backend for --device, e.g. v4l2, avfoundation, dshow.
    #[arg(long, requires = "device")]
    format: Option<String>,

    /// Replay a directory of images instead of opening a camera.
    #[arg(long, conflicts_with = "device")]
    images: Option<PathBuf>,

    /// Restart the image directory after the last image.
    #[arg(long, requires = "images")]
    loop_images: bool,

    /// Capture resolution requested from the camera, e.g. 1280x720.
    #[arg(long, value_parser = parse_view_size, conflicts_with = "images")]
    video_size: Option<(u32, u32)>,

    /// Capture frame rate. For --images, 0 replays as fast as possible.
    #[arg(long)]
    fps: Option<f64>,

    /// Camera facing: front or back.
    #[arg(long)]
    camera: Option<CameraPosition>,

    /// Device orientation, e.g. portrait, landscape-left, face-up.
    #[arg(long)]
    orientation: Option<DeviceOrientation>,

    /// BlazeFace ONNX model (default: resolved from the model cache).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Stop after this many frames reach the detector.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Write annotated preview snapshots to this directory.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Write a snapshot every Nth detection result.
    #[arg(long, default_value = "30")]
    snapshot_every: usize,

    /// Preview size in pixels, e.g. 640x480.
    #[arg(long, value_parser = parse_view_size)]
    view_size: Option<(u32, u32)>,

    /// Settings file (default: the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Queue frames for a busy detector instead of dropping them.
    #[arg(long)]
    keep_late_frames: bool,
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

    let mut settings = load_settings(&cli)?;
    apply_overrides(&cli, &mut settings);
    validate_settings(&settings)?;

    let detector = build_detector(&settings)?;
    let orientation: Arc<dyn OrientationSource> =
        Arc::new(FixedOrientation(settings.device_orientation));
    let logger = Arc::new(Mutex::new(StdoutPipelineLogger::default()));
    let (main_handle, main_loop) = main_queue::<Renderer>();

    let mut session = CaptureSession::new();
    let discovery = || open_device(&cli, &settings);
    session.attach_default_input(&discovery);
    let camera_position = session
        .input_position()
        .unwrap_or(settings.camera_position);

    let dispatcher = DetectionDispatcher::forward_to_renderer(
        detector,
        orientation.clone(),
        camera_position,
        logger.clone(),
        main_handle,
    );
    let mut output = VideoDataOutput::new();
    output.set_sample_buffer_delegate(Box::new(dispatcher), &settings.queue_label);
    output.set_discards_late_frames(settings.discard_late_frames);
    session.add_output(output)?;

    let surface = ImageOverlaySurface::new(settings.view_width, settings.view_height)
        .with_style(settings.overlay_color, OVERLAY_THICKNESS);
    let mut renderer =
        PreviewRenderer::new(surface).with_orientation_source(orientation, camera_position);
    renderer.bind_feed(session.preview_feed());

    log::info!(
        "Detecting faces ({} camera, {})",
        camera_position,
        settings.device_orientation
    );
    session.start_running()?;
    drive_main_loop(&cli, &session, &main_loop, &mut renderer);
    session.stop_running();
    main_loop.run_pending(&mut renderer);

    let stats = session.stats();
    let mut logger = logger.lock().unwrap_or_else(|p| p.into_inner());
    logger.metric("late_frames", stats.dropped as f64);
    logger.info(&format!(
        "Captured {} frames, {} reached the detector, {} dropped as late",
        stats.captured, stats.delivered, stats.dropped
    ));
    logger.summary();
    Ok(())
}

/// Runs detection results and preview refreshes on this thread until the
/// source ends or the frame limit is reached.
fn drive_main_loop(
    cli: &Cli,
    session: &CaptureSession,
    main_loop: &MainLoop<Renderer>,
    renderer: &mut Renderer,
) {
    let writer = ImageFileWriter::new();
    let every = cli.snapshot_every.max(1);
    let mut snapshots = 0usize;

    loop {
        main_loop.run_until(renderer, Instant::now() + MAIN_LOOP_TICK);
        renderer.present_latest();

        if let Some(dir) = &cli.snapshot_dir {
            if renderer.results_shown() / every > snapshots {
                snapshots += 1;
                let path = dir.join(format!("frame_{:06}.png", renderer.results_shown()));
                match renderer.surface().write_snapshot(&writer, &path) {
                    Ok(()) => log::debug!("Snapshot written to {}", path.display()),
                    Err(e) => log::warn!("Could not write snapshot {}: {e}", path.display()),
                }
            }
        }

        if let Some(max) = cli.max_frames {
            if session.stats().delivered >= max {
                log::info!("Reached {max} frames");
                break;
            }
        }
        if !session.is_delivering() {
            break;
        }
    }

    if snapshots > 0 {
        if let Some(dir) = &cli.snapshot_dir {
            log::info!("Saved {snapshots} snapshots to {}", dir.display());
        }
    }
}

fn open_device(cli: &Cli, settings: &Settings) -> Option<Box<dyn VideoDevice>> {
    if let Some(dir) = &cli.images {
        let device = ImageSequenceDevice::new(dir)
            .looping(cli.loop_images)
            .with_frame_rate(cli.fps.unwrap_or(0.0))
            .with_position(settings.camera_position)
            .with_camera_intrinsics(settings.camera_intrinsics);
        return Some(Box::new(device));
    }

    let device = match &settings.device {
        Some(url) => FfmpegCameraDevice::new(url.clone(), settings.device_format.as_deref()),
        None => FfmpegCameraDevice::platform_default()?,
    };
    let mut device = device
        .with_position(settings.camera_position)
        .with_camera_intrinsics(settings.camera_intrinsics);
    if let Some((width, height)) = cli.video_size {
        device = device.with_video_size(width, height);
    }
    if let Some(fps) = cli.fps {
        device = device.with_frame_rate(fps);
    }
    Some(Box::new(device))
}

fn build_detector(settings: &Settings) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let model_path = match &settings.model_path {
        Some(path) => path.clone(),
        None => {
            log::info!("Resolving model: {BLAZEFACE_MODEL_NAME}");
            let resolver = ModelResolver::new(bundled_models_dir())?;
            resolve_model(&resolver, settings)?
        }
    };
    Ok(Box::new(OnnxBlazefaceDetector::new(
        &model_path,
        settings.confidence,
    )?))
}

fn resolve_model(
    resolver: &ModelResolver,
    settings: &Settings,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let url = settings.model_url.as_deref();
    let progress: Option<ProgressFn> = url.map(|_| Box::new(download_progress) as ProgressFn);
    match resolver.resolve(BLAZEFACE_MODEL_NAME, url, progress) {
        Ok(path) => {
            if url.is_some() {
                eprintln!();
            }
            Ok(path)
        }
        Err(ModelResolveError::NotFound(name)) => Err(format!(
            "Model {name} not found in {}. Pass --model <path> or set model_url in settings",
            resolver.cache_dir().display()
        )
        .into()),
        Err(e) => Err(e.into()),
    }
}

/// `models/` next to the executable, for packaged installs.
fn bundled_models_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("models")))
}

/// An explicit settings file must load; the default one falls back to
/// defaults.
fn load_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    match &cli.config {
        Some(path) => Ok(Settings::load_from(path)?),
        None => Ok(Settings::load()),
    }
}

fn apply_overrides(cli: &Cli, settings: &mut Settings) {
    if let Some(device) = &cli.device {
        settings.device = Some(device.clone());
        settings.device_format = cli.format.clone();
    }
    if let Some(camera) = cli.camera {
        settings.camera_position = camera;
    }
    if let Some(orientation) = cli.orientation {
        settings.device_orientation = orientation;
    }
    if let Some(model) = &cli.model {
        settings.model_path = Some(model.clone());
    }
    if let Some(confidence) = cli.confidence {
        settings.confidence = confidence;
    }
    if let Some((width, height)) = cli.view_size {
        settings.view_width = width;
        settings.view_height = height;
    }
    if cli.keep_late_frames {
        settings.discard_late_frames = false;
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(dir) = &cli.images {
        if !dir.is_dir() {
            return Err(format!("Image directory not found: {}", dir.display()).into());
        }
    }
    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(format!("Settings file not found: {}", path.display()).into());
        }
    }
    if let Some(path) = &cli.model {
        if !path.exists() {
            return Err(format!("Model file not found: {}", path.display()).into());
        }
    }
    if let Some(fps) = cli.fps {
        if !(fps >= 0.0 && fps.is_finite()) {
            return Err(format!("Frame rate must be a non-negative number, got {fps}").into());
        }
    }
    if cli.max_frames == Some(0) {
        return Err("--max-frames must be at least 1".into());
    }
    if cli.snapshot_every == 0 {
        return Err("--snapshot-every must be at least 1".into());
    }
    Ok(())
}

fn validate_settings(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&settings.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            settings.confidence
        )
        .into());
    }
    if settings.view_width == 0 || settings.view_height == 0 {
        return Err(format!(
            "View size must be non-zero, got {}x{}",
            settings.view_width, settings.view_height
        )
        .into());
    }
    Ok(())
}

fn parse_view_size(s: &str) -> Result<(u32, u32), String> {
    let invalid = || format!("expected WIDTHxHEIGHT, got '{s}'");
    let (w, h) = s.split_once(|c| c == 'x' || c == 'X').ok_or_else(invalid)?;
    let width: u32 = w.trim().parse().map_err(|_| invalid())?;
    let height: u32 = h.trim().parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
