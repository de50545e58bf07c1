//! Frame sources

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::{CameraConfig, CameraError, SourceKind, VideoFrame};

/// A camera handle producing frames at the device's native rate
///
/// `read_frame` blocks until the next frame is available. Any error ends the
/// capture loop.
pub trait FrameSource: Send {
    /// Read the next frame
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Human-readable device name for logs
    fn describe(&self) -> String;
}

/// Open the source selected by the configuration
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    if config.fps == 0 {
        return Err(CameraError::Open("fps must be greater than zero".into()));
    }

    match config.source {
        SourceKind::Synthetic => Ok(Box::new(SyntheticSource::new(config))),
        SourceKind::Directory => {
            let dir = config
                .replay_dir
                .as_deref()
                .ok_or_else(|| CameraError::Open("replay_dir is required for the directory source".into()))?;
            Ok(Box::new(DirectorySource::open(dir, config.fps)?))
        }
    }
}

/// Keeps reads on a fixed cadence, like a device delivering frames at its native rate
struct Pacer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Pacer {
    fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            next_due: None,
        }
    }

    fn wait(&mut self) {
        let now = Instant::now();
        match self.next_due {
            Some(due) if due > now => {
                thread::sleep(due - now);
                self.next_due = Some(due + self.interval);
            }
            _ => self.next_due = Some(now + self.interval),
        }
    }
}

fn stream_timestamp_ns(sequence: u64, fps: u32) -> u64 {
    sequence * 1_000_000_000 / fps.max(1) as u64
}

/// Generates uniformly grey frames
pub struct SyntheticSource {
    width: u32,
    height: u32,
    fps: u32,
    frame_limit: Option<u64>,
    sequence: u64,
    pacer: Option<Pacer>,
}

impl SyntheticSource {
    /// Create a paced synthetic source
    pub fn new(config: &CameraConfig) -> Self {
        info!(
            "Opening synthetic source {}x{} @ {}fps",
            config.width, config.height, config.fps
        );
        Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
            frame_limit: config.frame_limit,
            sequence: 0,
            pacer: Some(Pacer::new(config.fps)),
        }
    }

    /// Produce frames as fast as they are read (timestamps still follow `fps`)
    pub fn unpaced(mut self) -> Self {
        self.pacer = None;
        self
    }
}

impl FrameSource for SyntheticSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if self.frame_limit.is_some_and(|limit| self.sequence >= limit) {
            return Err(CameraError::EndOfStream);
        }
        if let Some(pacer) = &mut self.pacer {
            pacer.wait();
        }

        let frame = VideoFrame::filled(
            self.width,
            self.height,
            128,
            stream_timestamp_ns(self.sequence, self.fps),
            self.sequence,
        );
        self.sequence += 1;
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("synthetic {}x{}@{}", self.width, self.height, self.fps)
    }
}

/// Replays still images from a directory in file-name order
pub struct DirectorySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    fps: u32,
    sequence: u64,
    pacer: Pacer,
}

impl DirectorySource {
    /// Index the image files of `dir`
    pub fn open(dir: &Path, fps: u32) -> Result<Self, CameraError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && image::ImageFormat::from_path(path).is_ok())
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CameraError::Open(format!("no images in {}", dir.display())));
        }

        info!("Opening replay source {} ({} images)", dir.display(), files.len());
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            fps,
            sequence: 0,
            pacer: Pacer::new(fps),
        })
    }

    /// Number of images to replay
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the directory held no images
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for DirectorySource {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        let path = self
            .files
            .get(self.sequence as usize)
            .ok_or(CameraError::EndOfStream)?;

        self.pacer.wait();
        debug!("Replaying {}", path.display());

        let rgb = image::open(path)
            .map_err(|e| CameraError::Decode(format!("{}: {}", path.display(), e)))?
            .to_rgb8();
        let (width, height) = rgb.dimensions();

        let frame = VideoFrame::new(
            rgb.into_raw(),
            width,
            height,
            stream_timestamp_ns(self.sequence, self.fps),
            self.sequence,
        );
        self.sequence += 1;
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("replay {}", self.dir.display())
    }
}
