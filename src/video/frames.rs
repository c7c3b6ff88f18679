//! PNG image-sequence sink, handy for inspecting individual frames.

use super::{check_frame_size, FrameSink, SinkError};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Writes `frame_00000.png`, `frame_00001.png`, ... into a directory.
pub struct ImageSequenceSink {
    directory: PathBuf,
    width: u32,
    height: u32,
    next_index: usize,
    closed: bool,
}

impl ImageSequenceSink {
    /// Create the directory if needed.
    pub fn new<P: AsRef<Path>>(directory: P, width: u32, height: u32) -> Result<Self, SinkError> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            width,
            height,
            next_index: 0,
            closed: false,
        })
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.directory.join(format!("frame_{index:05}.png"))
    }

    pub fn frames_written(&self) -> usize {
        self.next_index
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, rgb: &[u8]) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        check_frame_size(rgb, self.width, self.height)?;
        let image = RgbImage::from_raw(self.width, self.height, rgb.to_vec()).ok_or(
            SinkError::FrameSize {
                expected: self.width as usize * self.height as usize * 3,
                actual: rgb.len(),
            },
        )?;
        image.save(self.frame_path(self.next_index))?;
        self.next_index += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if !self.closed {
            self.closed = true;
            log::info!(
                "Wrote {} frames to {}",
                self.next_index,
                self.directory.display()
            );
        }
        Ok(())
    }
}
