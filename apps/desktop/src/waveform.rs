use eframe::egui;
use timeline::{timeparse, MarkerId, MarkerStore, Seconds};
use tracing::debug;

/// Min/max peak pairs for one display bucket, in [-1, 1].
#[derive(Clone, Debug, Default)]
pub struct WaveformPeaks {
    pub peaks: Vec<(f32, f32)>,
    pub duration_sec: f64,
}

/// Folds interleaved samples into `buckets` (min, max) pairs, mixing
/// channels down. Pure so it can run on a worker thread after decode.
pub fn sample_peaks(samples: &[f32], channels: u16, buckets: usize) -> Vec<(f32, f32)> {
    let ch = channels.max(1) as usize;
    let frames = samples.len() / ch;
    if frames == 0 || buckets == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(buckets);
    for b in 0..buckets {
        let start = b * frames / buckets;
        let end = ((b + 1) * frames / buckets).max(start + 1).min(frames);
        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for frame in start..end {
            let mut acc = 0.0f32;
            for c in 0..ch {
                acc += samples[frame * ch + c];
            }
            let v = acc / ch as f32;
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if lo > hi {
            lo = 0.0;
            hi = 0.0;
        }
        out.push((lo, hi));
    }
    out
}

/// What the user did on the waveform this frame. The app translates these
/// into store mutations and bus signals; the panel never touches the
/// document directly.
#[derive(Debug, Clone, PartialEq)]
pub enum WaveformAction {
    Seek(Seconds),
    MarkerClicked(MarkerId),
    MarkerMoved(MarkerId),
    MarkerRemoved(MarkerId),
    MarkerAdded(Seconds),
    /// Armed pending-link click on empty waveform: place a marker here and
    /// bind the waiting scene in one step.
    LinkHere(Seconds),
}

/// Pending confirm dialog for a new marker.
struct AddMarkerDialog {
    time_text: String,
    error: Option<String>,
}

#[derive(Default)]
pub struct WaveformPanel {
    add_dialog: Option<AddMarkerDialog>,
    dragging: Option<MarkerId>,
}

const WAVE_HEIGHT: f32 = 96.0;
const MARKER_HEAD_RADIUS: f32 = 5.0;

impl WaveformPanel {
    /// Draws the waveform strip with markers and playhead. `pending_link`
    /// highlights markers as link targets while a scene waits for one.
    pub fn ui(
        &mut self,
        ui: &mut egui::Ui,
        store: &mut MarkerStore,
        peaks: Option<&WaveformPeaks>,
        playhead: Seconds,
        pending_link: bool,
    ) -> Vec<WaveformAction> {
        let mut actions = Vec::new();

        let width = ui.available_width().max(64.0);
        let (rect, response) = ui.allocate_exact_size(
            egui::vec2(width, WAVE_HEIGHT),
            egui::Sense::click_and_drag(),
        );
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 2.0, ui.visuals().extreme_bg_color);

        if let Some(peaks) = peaks {
            self.paint_peaks(&painter, rect, peaks);
        } else {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Load an audio file to begin",
                egui::FontId::proportional(13.0),
                ui.visuals().weak_text_color(),
            );
        }

        let duration = store.duration();
        if duration > 0.0 {
            self.paint_markers(ui, &painter, rect, store, pending_link);
            self.paint_playhead(&painter, rect, playhead, duration);
            self.handle_pointer(ui, rect, &response, store, pending_link, &mut actions);
        }

        // right-click anywhere opens the add dialog at that time
        if response.secondary_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let time = store.time_at_x(pos.x - rect.left(), rect.width());
                self.add_dialog = Some(AddMarkerDialog {
                    time_text: timeparse::format_time(time),
                    error: None,
                });
            }
        }

        self.show_add_dialog(ui.ctx(), store, &mut actions);
        actions
    }

    fn paint_peaks(&self, painter: &egui::Painter, rect: egui::Rect, peaks: &WaveformPeaks) {
        if peaks.peaks.is_empty() {
            return;
        }
        let mid = rect.center().y;
        let half = rect.height() * 0.45;
        let step = rect.width() / peaks.peaks.len() as f32;
        let color = egui::Color32::from_rgb(110, 170, 220);
        for (i, (lo, hi)) in peaks.peaks.iter().enumerate() {
            let x = rect.left() + i as f32 * step;
            let y0 = mid - hi.clamp(-1.0, 1.0) * half;
            let y1 = mid - lo.clamp(-1.0, 1.0) * half;
            painter.line_segment(
                [egui::pos2(x, y0), egui::pos2(x, y1.max(y0 + 1.0))],
                egui::Stroke::new(1.0, color),
            );
        }
    }

    fn paint_markers(
        &self,
        ui: &egui::Ui,
        painter: &egui::Painter,
        rect: egui::Rect,
        store: &MarkerStore,
        pending_link: bool,
    ) {
        let base = if pending_link {
            egui::Color32::from_rgb(250, 200, 80)
        } else {
            egui::Color32::from_rgb(235, 110, 100)
        };
        for (index, marker) in store.markers().iter().enumerate() {
            let Some(local_x) = store.marker_x(index, rect.width()) else {
                continue;
            };
            let x = rect.left() + local_x;
            let dragged = self.dragging == Some(marker.id);
            let color = if dragged {
                ui.visuals().strong_text_color()
            } else {
                base
            };
            painter.line_segment(
                [egui::pos2(x, rect.top()), egui::pos2(x, rect.bottom())],
                egui::Stroke::new(if dragged { 2.0 } else { 1.5 }, color),
            );
            painter.circle_filled(
                egui::pos2(x, rect.top() + MARKER_HEAD_RADIUS),
                MARKER_HEAD_RADIUS,
                color,
            );
        }
    }

    fn paint_playhead(
        &self,
        painter: &egui::Painter,
        rect: egui::Rect,
        playhead: Seconds,
        duration: Seconds,
    ) {
        let frac = (playhead / duration).clamp(0.0, 1.0) as f32;
        let x = rect.left() + frac * rect.width();
        painter.line_segment(
            [egui::pos2(x, rect.top()), egui::pos2(x, rect.bottom())],
            egui::Stroke::new(1.0, egui::Color32::WHITE),
        );
    }

    fn handle_pointer(
        &mut self,
        ui: &egui::Ui,
        rect: egui::Rect,
        response: &egui::Response,
        store: &mut MarkerStore,
        pending_link: bool,
        actions: &mut Vec<WaveformAction>,
    ) {
        let pointer_x = response
            .interact_pointer_pos()
            .map(|p| p.x - rect.left());

        if response.drag_started() {
            if let Some(x) = pointer_x {
                if let Some(index) = store.hit_test(x, rect.width()) {
                    if let Ok(id) = store.begin_drag(index) {
                        self.dragging = Some(id);
                    }
                }
            }
        }

        if let Some(id) = self.dragging {
            if response.dragged() {
                if let Some(x) = pointer_x {
                    let time = store.time_at_x(x, rect.width());
                    let _ = store.drag_to(time);
                }
            }
            if response.drag_stopped() {
                match store.commit_drag() {
                    Ok(outcome) if outcome.changed => {
                        debug!(marker = %id, "marker drag committed");
                        actions.push(WaveformAction::MarkerMoved(id));
                    }
                    _ => {}
                }
                self.dragging = None;
            }
        } else if response.clicked() {
            if let Some(x) = pointer_x {
                let time = store.time_at_x(x, rect.width());
                match store.hit_test(x, rect.width()).and_then(|i| store.id_at(i)) {
                    Some(id) if pending_link => actions.push(WaveformAction::MarkerClicked(id)),
                    Some(id) if ui.input(|i| i.modifiers.alt) => {
                        actions.push(WaveformAction::MarkerRemoved(id));
                    }
                    Some(id) => actions.push(WaveformAction::MarkerClicked(id)),
                    None if pending_link => actions.push(WaveformAction::LinkHere(time)),
                    None if ui.input(|i| i.modifiers.command) => {
                        actions.push(WaveformAction::Seek(time));
                    }
                    None => {
                        self.add_dialog = Some(AddMarkerDialog {
                            time_text: timeparse::format_time(time),
                            error: None,
                        });
                    }
                }
            }
        }
    }

    fn show_add_dialog(
        &mut self,
        ctx: &egui::Context,
        store: &mut MarkerStore,
        actions: &mut Vec<WaveformAction>,
    ) {
        let Some(dialog) = self.add_dialog.as_mut() else {
            return;
        };
        let mut open = true;
        let mut confirmed = false;
        let mut cancelled = false;
        egui::Window::new("Add marker")
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Time:");
                    ui.text_edit_singleline(&mut dialog.time_text);
                });
                if let Some(err) = &dialog.error {
                    ui.colored_label(ui.visuals().error_fg_color, err);
                }
                ui.horizontal(|ui| {
                    if ui.button("Add").clicked() {
                        confirmed = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                });
            });

        if confirmed {
            match timeparse::parse_time(&dialog.time_text) {
                Ok(time) => {
                    store.add_marker(time);
                    actions.push(WaveformAction::MarkerAdded(time));
                    self.add_dialog = None;
                }
                Err(err) => dialog.error = Some(err.to_string()),
            }
        } else if !open || cancelled {
            self.add_dialog = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_peaks_bucket_count() {
        let samples: Vec<f32> = (0..1000).map(|i| (i as f32 / 1000.0).sin()).collect();
        let peaks = sample_peaks(&samples, 1, 100);
        assert_eq!(peaks.len(), 100);
        for (lo, hi) in &peaks {
            assert!(lo <= hi);
        }
    }

    #[test]
    fn test_sample_peaks_downmixes_stereo() {
        // L = 1.0, R = -1.0 everywhere: the mono mix cancels to zero
        let samples: Vec<f32> = (0..200)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let peaks = sample_peaks(&samples, 2, 10);
        for (lo, hi) in peaks {
            assert!(lo.abs() < 1e-6);
            assert!(hi.abs() < 1e-6);
        }
    }

    #[test]
    fn test_sample_peaks_empty_input() {
        assert!(sample_peaks(&[], 2, 64).is_empty());
        assert!(sample_peaks(&[0.5, 0.5], 2, 0).is_empty());
    }

    #[test]
    fn test_sample_peaks_captures_extremes() {
        let mut samples = vec![0.0f32; 512];
        samples[100] = 0.9;
        samples[300] = -0.8;
        let peaks = sample_peaks(&samples, 1, 4);
        let global_hi = peaks.iter().map(|p| p.1).fold(f32::MIN, f32::max);
        let global_lo = peaks.iter().map(|p| p.0).fold(f32::MAX, f32::min);
        assert!((global_hi - 0.9).abs() < 1e-6);
        assert!((global_lo + 0.8).abs() < 1e-6);
    }
}
