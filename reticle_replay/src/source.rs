use reticle::{ChannelOrder, Error, Frame, FrameSource, Key, KeySampler, Result};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Plays back a directory of image files, in file-name order, as captured frames.
pub struct ImageSequenceSource {
    paths: VecDeque<PathBuf>,
    order: ChannelOrder,
}

impl ImageSequenceSource {
    pub fn from_dir(dir: &Path, order: ChannelOrder) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        if paths.is_empty() {
            return Err(Error::capture(format!("no image files in {}", dir.display())));
        }
        paths.sort();
        info!(frames = paths.len(), dir = %dir.display(), "replay source ready");
        Ok(Self {
            paths: paths.into(),
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn focus_current_window(&mut self) -> Result<()> {
        Ok(())
    }

    fn take_screenshot(&mut self) -> Result<Frame> {
        let path = self
            .paths
            .pop_front()
            .ok_or_else(|| Error::capture("replay exhausted"))?;
        debug!(path = %path.display(), "loading frame");
        let mut frame = image::open(&path)?.to_rgb8();
        // Decoded files are RGB; reorder to what the pipeline expects.
        if self.order == ChannelOrder::Bgr {
            for px in frame.pixels_mut() {
                px.0.swap(0, 2);
            }
        }
        Ok(frame)
    }
}

/// Holds the engage key (if any) for a fixed number of samples, then presses quit.
pub struct ReplayKeys {
    engage: Option<Key>,
    quit: Key,
    remaining: usize,
}

impl ReplayKeys {
    pub fn new(engage: Option<Key>, quit: Key, frames: usize) -> Self {
        Self {
            engage,
            quit,
            remaining: frames,
        }
    }
}

impl KeySampler for ReplayKeys {
    fn held_keys(&mut self) -> Result<HashSet<Key>> {
        if self.remaining == 0 {
            return Ok(HashSet::from([self.quit]));
        }
        self.remaining -= 1;
        Ok(self.engage.into_iter().collect())
    }
}
