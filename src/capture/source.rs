use crate::errors::MeasureError;
use crate::types::Frame;
use std::collections::VecDeque;
use std::path::PathBuf;

/// Pull-based frame producer driven by the capture loop.
///
/// `Ok(None)` means end of stream; an error ends the loop as well.
pub trait FrameSource: Send {
    /// Open the underlying stream
    fn start(&mut self) -> Result<(), MeasureError> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, MeasureError>;

    /// Release the underlying stream
    fn stop(&mut self) -> Result<(), MeasureError> {
        Ok(())
    }

    /// Identifier used in logs
    fn describe(&self) -> String;
}

/// In-memory frames, handed out in order
pub struct FrameSequence {
    frames: VecDeque<Frame>,
}

impl FrameSequence {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for FrameSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>, MeasureError> {
        Ok(self.frames.pop_front())
    }

    fn describe(&self) -> String {
        format!("sequence({} frames)", self.frames.len())
    }
}

/// Still images decoded from disk, one per frame
pub struct ImageFileSource {
    paths: VecDeque<PathBuf>,
}

impl ImageFileSource {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl FrameSource for ImageFileSource {
    fn start(&mut self) -> Result<(), MeasureError> {
        if let Some(missing) = self.paths.iter().find(|p| !p.exists()) {
            return Err(MeasureError::Initialization(format!(
                "image not found: {}",
                missing.display()
            )));
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, MeasureError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let image = image::open(&path)
            .map_err(|e| MeasureError::Capture(format!("Failed to decode {}: {}", path.display(), e)))?
            .to_rgb8();
        log::debug!("Loaded {} ({}x{})", path.display(), image.width(), image.height());
        Ok(Some(Frame::from_rgb_image(
            image,
            path.display().to_string(),
        )))
    }

    fn describe(&self) -> String {
        format!("files({} remaining)", self.paths.len())
    }
}
