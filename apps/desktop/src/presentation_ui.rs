use eframe::egui;
use project::{MediaType, Scene};
use std::path::PathBuf;
use timeline::{
    MediaController, MediaSurface, PresentationMode, PresentationSession, Seconds, VideoSegment,
};
use tracing::warn;

use crate::media_cache::MediaCache;

// video frames are re-extracted at this granularity while a segment plays
const FRAME_STEP_SEC: f64 = 0.5;
const FRAME_WIDTH: u32 = 960;
const FRAME_HEIGHT: u32 = 540;

enum PendingLoad {
    Scene { path: Option<PathBuf>, seq: u64 },
    SegmentFrame { seq: u64 },
}

struct SegmentPlayback {
    segment: VideoSegment,
    local_time: Seconds,
    playing: bool,
    shown_frame: Option<Seconds>,
}

/// What the user did inside the presentation window this frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationAction {
    ModeSelected(PresentationMode),
    Close,
    SeekRequested(f64),
    NextSegment,
    PreviousSegment,
    SegmentFinished,
}

/// The presentation window: owns the visible surface and fulfills the
/// session's media load requests against the texture cache.
#[derive(Default)]
pub struct PresentationUi {
    surface: Option<MediaSurface>,
    pending: Option<PendingLoad>,
    shown_path: Option<PathBuf>,
    texture: Option<egui::TextureHandle>,
    segment: Option<SegmentPlayback>,
}

impl MediaController for PresentationUi {
    fn pause_all(&mut self) {
        if let Some(playback) = &mut self.segment {
            playback.playing = false;
        }
    }

    fn show_surface(&mut self, surface: MediaSurface) {
        self.surface = Some(surface);
    }

    fn load_scene_media(&mut self, scene: &Scene, media: MediaType, seq: u64) {
        self.segment = None;
        self.pending = Some(PendingLoad::Scene {
            path: scene.media_path(media).map(|p| p.to_path_buf()),
            seq,
        });
    }

    fn load_segment(&mut self, segment: &VideoSegment, local_time: Seconds, seq: u64) {
        self.segment = Some(SegmentPlayback {
            segment: segment.clone(),
            local_time,
            playing: true,
            shown_frame: None,
        });
        self.pending = Some(PendingLoad::SegmentFrame { seq });
    }

    fn detach_all(&mut self) {
        self.surface = None;
        self.pending = None;
        self.shown_path = None;
        self.texture = None;
        self.segment = None;
    }
}

impl PresentationUi {
    /// Resolves the session's outstanding load request, dropping it when a
    /// newer one has superseded it.
    pub fn fulfill_loads(
        &mut self,
        ctx: &egui::Context,
        cache: &mut MediaCache,
        session: &PresentationSession,
    ) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        match pending {
            PendingLoad::Scene { path, seq } => {
                if !session.is_load_current(seq) {
                    return;
                }
                match path {
                    Some(path) => self.swap_texture(ctx, cache, path),
                    None => {
                        self.release_shown(cache);
                        self.texture = None;
                    }
                }
            }
            PendingLoad::SegmentFrame { seq } => {
                if !session.is_load_current(seq) {
                    return;
                }
                self.refresh_segment_frame(ctx, cache);
            }
        }
    }

    /// Advances combined-mode playback by the frame delta. Returns
    /// `SegmentFinished` when the current clip runs out.
    pub fn tick(
        &mut self,
        ctx: &egui::Context,
        cache: &mut MediaCache,
        dt: f64,
    ) -> Option<PresentationAction> {
        let playback = self.segment.as_mut()?;
        if !playback.playing {
            return None;
        }
        playback.local_time += dt;
        if playback.local_time >= playback.segment.duration {
            return Some(PresentationAction::SegmentFinished);
        }
        self.refresh_segment_frame(ctx, cache);
        ctx.request_repaint();
        None
    }

    pub fn segment_local_time(&self) -> Option<Seconds> {
        self.segment.as_ref().map(|p| p.local_time)
    }

    pub fn set_segment_playing(&mut self, playing: bool) {
        if let Some(playback) = &mut self.segment {
            playback.playing = playing;
        }
    }

    pub fn release_textures(&mut self, cache: &mut MediaCache) {
        self.release_shown(cache);
        self.texture = None;
    }

    /// Draws the window. Mode switches, seeks, and navigation come back as
    /// actions; the app owns the session and applies them.
    pub fn window(
        &mut self,
        ctx: &egui::Context,
        session: &PresentationSession,
        has_audio: bool,
        audio_position: Option<Seconds>,
    ) -> Vec<PresentationAction> {
        let mut actions = Vec::new();
        let Some(mode) = session.mode() else {
            return actions;
        };

        let mut open = true;
        egui::Window::new("Presentation")
            .open(&mut open)
            .default_size([980.0, 640.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    for candidate in PresentationMode::ALL {
                        let audio_gated = candidate.is_audio_driven() && !has_audio;
                        let selected = candidate == mode;
                        let button =
                            ui.add_enabled(!audio_gated, egui::SelectableLabel::new(selected, candidate.display_name()));
                        if button.clicked() && !selected {
                            actions.push(PresentationAction::ModeSelected(candidate));
                        }
                    }
                });
                ui.separator();

                self.media_area(ui);

                if mode == PresentationMode::CombinedVideo {
                    self.combined_controls(ui, session, &mut actions);
                } else if mode.is_audio_driven() {
                    if let Some(pos) = audio_position {
                        ui.label(timeline::timeparse::format_time(pos));
                    }
                }
            });
        if !open {
            actions.push(PresentationAction::Close);
        }
        actions
    }

    fn media_area(&self, ui: &mut egui::Ui) {
        let avail = ui.available_size() - egui::vec2(0.0, 48.0);
        match (&self.texture, self.surface) {
            (Some(texture), Some(_)) => {
                let size = texture.size_vec2();
                let scale = (avail.x / size.x).min(avail.y / size.y).min(1.0);
                ui.centered_and_justified(|ui| {
                    ui.image((texture.id(), size * scale.max(0.05)));
                });
            }
            _ => {
                ui.centered_and_justified(|ui| {
                    ui.label(egui::RichText::new("No media for this scene").weak());
                });
            }
        }
    }

    fn combined_controls(
        &mut self,
        ui: &mut egui::Ui,
        session: &PresentationSession,
        actions: &mut Vec<PresentationAction>,
    ) {
        let Some(track) = session.segments() else {
            return;
        };
        let local = self.segment_local_time().unwrap_or(0.0);
        let mut pct = track.global_percentage(local);

        ui.horizontal(|ui| {
            if ui.button("⏮").clicked() {
                actions.push(PresentationAction::PreviousSegment);
            }
            let playing = self.segment.as_ref().map(|p| p.playing).unwrap_or(false);
            if ui.button(if playing { "⏸" } else { "▶" }).clicked() {
                self.set_segment_playing(!playing);
            }
            if ui.button("⏭").clicked() {
                actions.push(PresentationAction::NextSegment);
            }

            let slider = ui.add(
                egui::Slider::new(&mut pct, 0.0..=100.0)
                    .show_value(false)
                    .trailing_fill(true),
            );
            if slider.drag_stopped() || (slider.changed() && !slider.dragged()) {
                actions.push(PresentationAction::SeekRequested(pct));
            }
            let global = track
                .current_segment()
                .map(|s| s.start_time + local)
                .unwrap_or(0.0);
            ui.label(format!(
                "{} / {}",
                timeline::timeparse::format_time(global),
                timeline::timeparse::format_time(track.total_duration()),
            ));
        });
    }

    fn refresh_segment_frame(&mut self, ctx: &egui::Context, cache: &mut MediaCache) {
        let Some(playback) = &mut self.segment else {
            return;
        };
        let quantized = (playback.local_time / FRAME_STEP_SEC).floor() * FRAME_STEP_SEC;
        if playback.shown_frame == Some(quantized) {
            return;
        }
        let path = playback.segment.path.clone();
        match cache.acquire_video_frame(ctx, &path, quantized, FRAME_WIDTH, FRAME_HEIGHT) {
            Ok(texture) => {
                if let Some(playback) = &mut self.segment {
                    playback.shown_frame = Some(quantized);
                }
                if let Some(old) = self.shown_path.take() {
                    cache.release(&old);
                }
                // the frame cache key is the extracted png path
                self.shown_path = Some(cache.frame_path(&path, quantized));
                self.texture = Some(texture);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "frame extraction failed");
                if let Some(playback) = &mut self.segment {
                    playback.shown_frame = Some(quantized);
                }
            }
        }
    }

    fn swap_texture(&mut self, ctx: &egui::Context, cache: &mut MediaCache, path: PathBuf) {
        if self.shown_path.as_deref() == Some(path.as_path()) {
            return;
        }
        match cache.acquire_image(ctx, &path) {
            Ok(texture) => {
                if let Some(old) = self.shown_path.take() {
                    cache.release(&old);
                }
                self.shown_path = Some(path);
                self.texture = Some(texture);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "media load failed");
            }
        }
    }

    fn release_shown(&mut self, cache: &mut MediaCache) {
        if let Some(old) = self.shown_path.take() {
            cache.release(&old);
        }
    }
}
