use anyhow::{Context as _, Result};
use eframe::egui;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

struct Entry {
    handle: egui::TextureHandle,
    refs: usize,
}

/// Refcounted texture pool for scene stills and extracted video frames.
/// Multiple panels can hold the same image; the GPU copy is dropped only
/// when the last holder releases it.
pub struct MediaCache {
    textures: HashMap<PathBuf, Entry>,
    frame_dir: PathBuf,
}

impl MediaCache {
    pub fn new() -> Self {
        let frame_dir = std::env::temp_dir().join("storyboard_studio_frames");
        Self {
            textures: HashMap::new(),
            frame_dir,
        }
    }

    /// Loads (or re-uses) the image at `path` and bumps its refcount.
    pub fn acquire_image(
        &mut self,
        ctx: &egui::Context,
        path: &Path,
    ) -> Result<egui::TextureHandle> {
        if let Some(entry) = self.textures.get_mut(path) {
            entry.refs += 1;
            return Ok(entry.handle.clone());
        }
        let handle = load_texture(ctx, path)?;
        self.textures.insert(
            path.to_path_buf(),
            Entry {
                handle: handle.clone(),
                refs: 1,
            },
        );
        debug!(path = %path.display(), "texture loaded");
        Ok(handle)
    }

    /// Extracts the frame at `at_sec` from a video and loads it like a
    /// still. Frames are keyed by (path, centisecond), so scrubbing back to
    /// the same spot hits the cache.
    pub fn acquire_video_frame(
        &mut self,
        ctx: &egui::Context,
        video_path: &Path,
        at_sec: f64,
        width: u32,
        height: u32,
    ) -> Result<egui::TextureHandle> {
        let frame_path = self.frame_path(video_path, at_sec);
        if !frame_path.exists() {
            std::fs::create_dir_all(&self.frame_dir)
                .with_context(|| format!("create {}", self.frame_dir.display()))?;
            media_io::generate_thumbnail(video_path, &frame_path, at_sec, width, height)?;
        }
        self.acquire_image(ctx, &frame_path)
    }

    /// Where the extracted frame for (video, time) lives on disk. Doubles
    /// as the cache key for frame textures.
    pub fn frame_path(&self, video_path: &Path, at_sec: f64) -> PathBuf {
        let stem = video_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("frame");
        self.frame_dir
            .join(format!("{stem}_{:07}.png", (at_sec * 100.0) as u64))
    }

    /// Drops one reference; the texture is freed when nobody holds it.
    pub fn release(&mut self, path: &Path) {
        if let Some(entry) = self.textures.get_mut(path) {
            entry.refs = entry.refs.saturating_sub(1);
            if entry.refs == 0 {
                self.textures.remove(path);
                debug!(path = %path.display(), "texture released");
            }
        }
    }

    pub fn release_all(&mut self) {
        self.textures.clear();
    }

    pub fn resident_count(&self) -> usize {
        self.textures.len()
    }
}

fn load_texture(ctx: &egui::Context, path: &Path) -> Result<egui::TextureHandle> {
    let img = image::open(path)
        .with_context(|| format!("open image {}", path.display()))?
        .to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    let color = egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw());
    Ok(ctx.load_texture(
        path.to_string_lossy(),
        color,
        egui::TextureOptions::LINEAR,
    ))
}
