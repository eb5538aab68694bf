//! Frame acquisition and stride sampling.
//!
//! Video decoding itself lives outside this crate; a [`FrameSource`] hands
//! over already-decoded RGB frames one at a time. The [`FrameSampler`]
//! consumes every frame (the decode cursor must keep advancing) but only
//! yields those whose index falls on the configured stride.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use tracing::{info, warn};

/// A sampled frame handed to the fusion engine.
pub struct Frame {
    /// Zero-based index in the source sequence.
    pub index: u64,
    /// Seconds from the start of the video (`index / fps`).
    pub timestamp: f64,
    pub image: RgbImage,
}

/// Sequential access to decoded frames.
///
/// `Ok(None)` means the source is exhausted. Errors from `next_frame` are
/// treated by the sampler as the end of the stream, not as fatal; failing
/// to open a source in the first place is the fatal case.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
    fn fps(&self) -> f64;
}

// ─── Stride sampler ──────────────────────────────────────────────────────────

/// Yields every `stride`-th frame, starting at index 0.
///
/// Lazy, finite and non-restartable: once `next_sampled` has returned
/// `None` it returns `None` forever.
pub struct FrameSampler<S> {
    source: S,
    stride: u64,
    next_index: u64,
    done: bool,
}

impl<S: FrameSource> FrameSampler<S> {
    pub fn new(source: S, stride: u32) -> Self {
        Self {
            source,
            stride: u64::from(stride.max(1)),
            next_index: 0,
            done: false,
        }
    }

    /// Next frame whose index satisfies `index % stride == 0`.
    ///
    /// Skipped frames are still pulled from the source so the underlying
    /// cursor stays correct. The first unreadable frame ends the stream.
    pub fn next_sampled(&mut self) -> Option<Frame> {
        if self.done {
            return None;
        }
        loop {
            let index = self.next_index;
            let image = match self.source.next_frame() {
                Ok(Some(image)) => image,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    warn!("Frame read failed at index {}: {} — ending stream", index, e);
                    self.done = true;
                    return None;
                }
            };
            self.next_index += 1;

            if index % self.stride != 0 {
                continue; // consumed, not processed
            }

            let timestamp = index as f64 / self.source.fps();
            return Some(Frame {
                index,
                timestamp,
                image,
            });
        }
    }
}

// ─── Image-directory source ──────────────────────────────────────────────────

/// Frame sequence backed by a directory of image files, sorted by name.
pub struct ImageDirSource {
    files: Vec<PathBuf>,
    cursor: usize,
    fps: f64,
}

impl ImageDirSource {
    /// List and sort the frame files. An unreadable or empty directory is
    /// fatal — there is nothing to process.
    pub fn open(dir: &Path, fps: f64) -> Result<Self> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("cannot open frame directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension()
                        .and_then(|ext| ext.to_str())
                        .map(|ext| ext.to_ascii_lowercase())
                        .as_deref(),
                    Some("jpg" | "jpeg" | "png")
                )
            })
            .collect();
        files.sort();

        if files.is_empty() {
            anyhow::bail!("no frames found in {}", dir.display());
        }

        info!(
            "Opened frame directory {} ({} frames, {:.1} fps)",
            dir.display(),
            files.len(),
            fps
        );
        Ok(Self {
            files,
            cursor: 0,
            fps,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        let image =
            image::open(path).with_context(|| format!("cannot decode {}", path.display()))?;
        self.cursor += 1;
        Ok(Some(image.to_rgb8()))
    }

    fn fps(&self) -> f64 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits `total` tiny frames, erroring at `fail_at` if set.
    struct CountingSource {
        total: u64,
        emitted: u64,
        fail_at: Option<u64>,
    }

    impl CountingSource {
        fn new(total: u64) -> Self {
            Self {
                total,
                emitted: 0,
                fail_at: None,
            }
        }
    }

    impl FrameSource for CountingSource {
        fn next_frame(&mut self) -> Result<Option<RgbImage>> {
            if Some(self.emitted) == self.fail_at {
                anyhow::bail!("simulated decode failure");
            }
            if self.emitted >= self.total {
                return Ok(None);
            }
            self.emitted += 1;
            Ok(Some(RgbImage::new(4, 4)))
        }

        fn fps(&self) -> f64 {
            30.0
        }
    }

    #[test]
    fn stride_five_over_23_frames() {
        let mut sampler = FrameSampler::new(CountingSource::new(23), 5);
        let mut indices = Vec::new();
        while let Some(frame) = sampler.next_sampled() {
            indices.push(frame.index);
        }
        assert_eq!(indices, vec![0, 5, 10, 15, 20]);
    }

    #[test]
    fn stride_one_keeps_every_frame() {
        let mut sampler = FrameSampler::new(CountingSource::new(4), 1);
        let mut indices = Vec::new();
        while let Some(frame) = sampler.next_sampled() {
            indices.push(frame.index);
        }
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn timestamps_follow_fps() {
        let mut sampler = FrameSampler::new(CountingSource::new(23), 5);
        sampler.next_sampled();
        let second = sampler.next_sampled().unwrap();
        assert_eq!(second.index, 5);
        assert!((second.timestamp - 5.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn read_failure_ends_stream_normally() {
        let mut source = CountingSource::new(23);
        source.fail_at = Some(3);
        let mut sampler = FrameSampler::new(source, 1);
        let mut indices = Vec::new();
        while let Some(frame) = sampler.next_sampled() {
            indices.push(frame.index);
        }
        assert_eq!(indices, vec![0, 1, 2]);
        // Non-restartable: stays exhausted.
        assert!(sampler.next_sampled().is_none());
    }

    #[test]
    fn image_dir_source_sorts_and_decodes() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["frame_002.png", "frame_000.png", "frame_001.png"] {
            let img = RgbImage::from_pixel(8, 6, image::Rgb([10, 20, 30]));
            img.save(dir.path().join(name)).unwrap();
        }
        // Non-frame files are ignored.
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let mut source = ImageDirSource::open(dir.path(), 25.0).unwrap();
        assert_eq!(source.len(), 3);
        let mut count = 0;
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.dimensions(), (8, 6));
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn empty_directory_is_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(ImageDirSource::open(dir.path(), 30.0).is_err());
    }
}
