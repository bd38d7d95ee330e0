use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use eframe::egui;
use project::{AudioTimeline, MediaType, ProjectRow, ProjectStore, SceneId, StoryboardDoc};
use timeline::{
    timeparse, ClipProbeError, ClipProber, EditorSignal, MarkerStore, PresentationMode,
    PresentationSession, SceneLinker, Seconds, SignalBus,
};
use tracing::{info, warn};

use crate::audio_decode::decode_audio_to_buffer;
use crate::audio_engine::AudioEngine;
use crate::media_cache::MediaCache;
use crate::presentation_ui::{PresentationAction, PresentationUi};
use crate::waveform::{sample_peaks, WaveformAction, WaveformPanel, WaveformPeaks};

const WAVEFORM_BUCKETS: usize = 1200;

type DecodeResult = Result<(PathBuf, crate::audio_engine::AudioBuffer), String>;

/// ffprobe-backed duration probing for the combined timeline.
struct FfProber;

impl ClipProber for FfProber {
    fn probe_duration(&self, path: &Path) -> Result<Seconds, ClipProbeError> {
        media_io::probe_duration(path).map_err(|e| ClipProbeError(e.to_string()))
    }
}

pub struct StoryboardApp {
    store: ProjectStore,
    projects: Vec<ProjectRow>,
    project_id: Option<String>,
    doc: StoryboardDoc,

    markers: MarkerStore,
    linker: SceneLinker,
    bus: SignalBus,
    inbox: Rc<RefCell<Vec<EditorSignal>>>,

    session: PresentationSession,
    presentation: PresentationUi,
    cache: MediaCache,

    waveform: WaveformPanel,
    peaks: Option<WaveformPeaks>,
    audio: Option<AudioEngine>,
    audio_path: Option<PathBuf>,
    decode_rx: Option<crossbeam_channel::Receiver<DecodeResult>>,

    selected_scene: Option<SceneId>,
    marker_edit: Option<(timeline::MarkerId, String)>,
    status: Option<String>,
}

impl StoryboardApp {
    pub fn new(store: ProjectStore) -> Self {
        let audio = match AudioEngine::new() {
            Ok(engine) => Some(engine),
            Err(err) => {
                warn!(error = %err, "audio engine unavailable");
                None
            }
        };

        let inbox: Rc<RefCell<Vec<EditorSignal>>> = Rc::default();
        let mut bus = SignalBus::new();
        {
            let inbox = Rc::clone(&inbox);
            bus.subscribe(move |signal| inbox.borrow_mut().push(signal.clone()));
        }

        let mut app = Self {
            store,
            projects: Vec::new(),
            project_id: None,
            doc: StoryboardDoc::default(),
            markers: MarkerStore::default(),
            linker: SceneLinker::new(),
            bus,
            inbox,
            session: PresentationSession::new(),
            presentation: PresentationUi::default(),
            cache: MediaCache::new(),
            waveform: WaveformPanel::default(),
            peaks: None,
            audio,
            audio_path: None,
            decode_rx: None,
            selected_scene: None,
            marker_edit: None,
            status: None,
        };
        app.refresh_projects();
        if let Some(first) = app.projects.first().map(|p| p.id.clone()) {
            app.open_project(&first);
        } else {
            match app.store.create_project("Untitled storyboard") {
                Ok(id) => app.open_project(&id),
                Err(err) => app.status = Some(format!("cannot create project: {err}")),
            }
        }
        app
    }

    fn refresh_projects(&mut self) {
        match self.store.list_projects() {
            Ok(rows) => self.projects = rows,
            Err(err) => self.status = Some(format!("cannot list projects: {err}")),
        }
    }

    fn open_project(&mut self, id: &str) {
        match self.store.load_document(id) {
            Ok(doc) => {
                self.doc = doc;
                self.project_id = Some(id.to_string());
                self.rebuild_from_doc();
                info!(project = id, "project opened");
            }
            Err(err) => self.status = Some(format!("cannot open project: {err}")),
        }
    }

    /// Rehydrates the runtime marker store and link table from the persisted
    /// document, then rewrites the derived scene fields so stale indices
    /// never survive a load.
    fn rebuild_from_doc(&mut self) {
        self.session.close(&mut self.presentation);
        self.presentation.release_textures(&mut self.cache);
        self.peaks = None;
        self.audio_path = None;
        if let Some(engine) = &self.audio {
            engine.clear_track();
        }

        self.markers = match &self.doc.audio_timeline {
            Some(tl) => MarkerStore::from_times(tl.audio_duration, &tl.markers),
            None => MarkerStore::default(),
        };
        self.linker = SceneLinker::rebuild(&self.markers, &mut self.doc.scenes);
        self.selected_scene = self.doc.scenes.first().map(|s| s.id);
    }

    /// Writes the marker view back into the document and saves. Every
    /// mutation path funnels through here, so disk state is at most one user
    /// action behind.
    fn persist(&mut self) {
        if let Some(tl) = self.doc.audio_timeline.as_mut() {
            tl.markers = self.markers.times();
        }
        if let Some(id) = &self.project_id {
            if let Err(err) = self.store.save_document(id, &self.doc) {
                self.status = Some(format!("save failed: {err}"));
            }
        }
    }

    fn has_audio(&self) -> bool {
        self.doc
            .audio_timeline
            .as_ref()
            .map(|tl| tl.has_audio_timeline)
            .unwrap_or(false)
    }

    /// Kicks off decode on a worker thread; the UI stays responsive and
    /// `poll_decode` installs the result.
    fn load_audio_file(&mut self, path: PathBuf) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.decode_rx = Some(rx);
        self.status = Some(format!("Decoding {}…", path.display()));
        std::thread::spawn(move || {
            let result = decode_audio_to_buffer(&path)
                .map(|buf| (path, buf))
                .map_err(|e| e.to_string());
            let _ = tx.send(result);
        });
    }

    fn poll_decode(&mut self) {
        let Some(rx) = &self.decode_rx else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok((path, buffer))) => {
                self.decode_rx = None;
                self.status = None;
                self.install_audio(path, Arc::new(buffer));
            }
            Ok(Err(err)) => {
                self.decode_rx = None;
                self.status = Some(format!("cannot decode audio: {err}"));
            }
            Err(crossbeam_channel::TryRecvError::Empty) => {}
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                self.decode_rx = None;
                self.status = Some("audio decode worker died".to_string());
            }
        }
    }

    fn install_audio(&mut self, path: PathBuf, buffer: Arc<crate::audio_engine::AudioBuffer>) {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.peaks = Some(WaveformPeaks {
            peaks: sample_peaks(&buffer.samples, buffer.channels, WAVEFORM_BUCKETS),
            duration_sec: buffer.duration_sec,
        });
        if let Some(engine) = &self.audio {
            engine.set_track(buffer.clone());
        }

        // a replacement track invalidates old cut points
        let duration = buffer.duration_sec;
        self.doc.audio_timeline = Some(AudioTimeline::new(file_name, duration));
        self.markers = MarkerStore::new(duration);
        self.linker = SceneLinker::rebuild(&self.markers, &mut self.doc.scenes);
        self.audio_path = Some(path);
        self.bus.emit(EditorSignal::MarkerSetChanged);
        self.persist();
    }

    fn remove_audio(&mut self) {
        self.session.close(&mut self.presentation);
        self.presentation.release_textures(&mut self.cache);
        if let Some(engine) = &self.audio {
            engine.clear_track();
        }
        self.doc.drop_audio_timeline();
        self.markers = MarkerStore::default();
        self.linker = SceneLinker::new();
        self.peaks = None;
        self.audio_path = None;
        self.bus.emit(EditorSignal::MarkerSetChanged);
        self.persist();
    }

    // --- signal handling ---

    fn drain_signals(&mut self) {
        let drained: Vec<EditorSignal> = self.inbox.borrow_mut().drain(..).collect();
        for signal in drained {
            self.handle_signal(signal);
        }
    }

    fn handle_signal(&mut self, signal: EditorSignal) {
        match signal {
            EditorSignal::MarkerSetChanged | EditorSignal::MarkerReindexed { .. } => {
                self.linker.resync(&self.markers, &mut self.doc.scenes);
                self.persist();
            }
            EditorSignal::SceneLinkRequested { scene_id, time } => {
                // link at a concrete time: reuse a marker at that spot or
                // cut a new one
                let marker_id = self
                    .markers
                    .markers()
                    .iter()
                    .find(|m| (m.time - time).abs() < 0.05)
                    .map(|m| m.id)
                    .unwrap_or_else(|| self.markers.add_marker(time));
                self.linker
                    .link(&self.markers, &mut self.doc.scenes, scene_id, marker_id);
                self.persist();
            }
            EditorSignal::SceneUnlinkRequested { marker_index } => {
                if let Some(id) = self.markers.id_at(marker_index) {
                    if let Some(scene_id) = self.linker.scene_for_marker(id) {
                        self.linker.unlink_scene(&mut self.doc.scenes, scene_id);
                        self.persist();
                    }
                }
            }
            EditorSignal::ActiveSceneChanged { scene_index } => {
                if let Some(scene) = self.doc.scenes.get(scene_index) {
                    self.selected_scene = Some(scene.id);
                }
            }
            EditorSignal::MediaTypeChanged { .. } => {
                self.persist();
            }
            EditorSignal::SegmentSeekRequested { percentage } => {
                self.session.seek_segments(percentage, &mut self.presentation);
            }
        }
    }

    // --- UI sections ---

    fn top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let selected_name = self
                .project_id
                .as_ref()
                .and_then(|id| self.projects.iter().find(|p| &p.id == id))
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "—".to_string());
            let mut switch_to: Option<String> = None;
            egui::ComboBox::from_label("Project")
                .selected_text(selected_name)
                .show_ui(ui, |ui| {
                    for row in &self.projects {
                        let selected = self.project_id.as_deref() == Some(row.id.as_str());
                        if ui.selectable_label(selected, &row.name).clicked() && !selected {
                            switch_to = Some(row.id.clone());
                        }
                    }
                });
            if let Some(id) = switch_to {
                self.open_project(&id);
            }
            if ui.button("New project").clicked() {
                match self.store.create_project("Untitled storyboard") {
                    Ok(id) => {
                        self.refresh_projects();
                        self.open_project(&id);
                    }
                    Err(err) => self.status = Some(format!("cannot create project: {err}")),
                }
            }

            ui.separator();

            if ui.button("Load audio…").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Audio", &["mp3", "wav", "m4a", "aac", "flac", "ogg"])
                    .pick_file()
                {
                    self.load_audio_file(path);
                }
            }
            if self.has_audio() && ui.button("Remove audio").clicked() {
                self.remove_audio();
            }

            ui.separator();

            if ui.button("Present").clicked() && !self.session.is_open() {
                let mode = self.session.enter(
                    PresentationMode::Image,
                    &self.doc.scenes,
                    self.has_audio(),
                    &FfProber,
                    &mut self.presentation,
                );
                info!(mode = mode.display_name(), "presentation opened");
            }

            if let Some(status) = &self.status {
                ui.separator();
                ui.colored_label(ui.visuals().warn_fg_color, status);
            }
        });
    }

    fn transport(&mut self, ui: &mut egui::Ui) {
        let Some(engine) = &self.audio else {
            return;
        };
        if !self.has_audio() {
            return;
        }
        ui.horizontal(|ui| {
            let playing = engine.is_playing();
            if ui.button(if playing { "⏸" } else { "▶" }).clicked() {
                if playing {
                    engine.pause();
                } else {
                    engine.play();
                }
            }
            if ui.button("⏹").clicked() {
                engine.pause();
                engine.seek(0.0);
            }
            ui.label(timeparse::format_time(engine.position()));
            if let Some(duration) = engine.duration() {
                ui.label(format!("/ {}", timeparse::format_time(duration)));
            }
            if self.linker.pending().is_some() {
                ui.separator();
                ui.colored_label(
                    egui::Color32::from_rgb(250, 200, 80),
                    "Click a marker to link the scene (Esc cancels)",
                );
            }
        });
    }

    fn waveform_section(&mut self, ui: &mut egui::Ui) {
        let playhead = self.audio.as_ref().map(|e| e.position()).unwrap_or(0.0);
        let pending_link = self.linker.pending().is_some();
        let actions = self.waveform.ui(
            ui,
            &mut self.markers,
            self.peaks.as_ref(),
            playhead,
            pending_link,
        );
        for action in actions {
            match action {
                WaveformAction::Seek(time) => {
                    if let Some(engine) = &self.audio {
                        engine.seek(time);
                    }
                }
                WaveformAction::MarkerClicked(id) => {
                    if let Some(scene_id) = self.linker.take_pending() {
                        self.linker
                            .link(&self.markers, &mut self.doc.scenes, scene_id, id);
                        self.persist();
                    }
                }
                WaveformAction::MarkerMoved(_) => {
                    self.bus.emit(EditorSignal::MarkerReindexed {
                        times: self.markers.times(),
                    });
                }
                WaveformAction::MarkerRemoved(id) => {
                    match self.markers.remove_marker(id) {
                        Ok(_) => {
                            self.linker
                                .on_marker_removed(&self.markers, &mut self.doc.scenes, id);
                            self.bus.emit(EditorSignal::MarkerSetChanged);
                        }
                        Err(err) => self.status = Some(err.to_string()),
                    }
                }
                WaveformAction::MarkerAdded(_) => {
                    self.bus.emit(EditorSignal::MarkerSetChanged);
                }
                WaveformAction::LinkHere(time) => {
                    if let Some(scene_id) = self.linker.take_pending() {
                        self.bus
                            .emit(EditorSignal::SceneLinkRequested { scene_id, time });
                    }
                }
            }
        }
        if pending_link && ui.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.linker.cancel_linkage();
        }
    }

    fn marker_list(&mut self, ui: &mut egui::Ui) {
        ui.heading("Markers");
        ui.separator();
        let markers: Vec<_> = self.markers.markers().to_vec();
        if markers.is_empty() {
            ui.label(egui::RichText::new("No markers yet").weak().italics());
            return;
        }
        let mut removed = None;
        let mut committed: Option<(timeline::MarkerId, String)> = None;
        for (index, marker) in markers.iter().enumerate() {
            ui.horizontal(|ui| {
                ui.monospace(format!("{index:>2}"));
                let editing = matches!(&self.marker_edit, Some((id, _)) if *id == marker.id);
                if editing {
                    if let Some((_, text)) = self.marker_edit.as_mut() {
                        let response = ui.add(
                            egui::TextEdit::singleline(text).desired_width(64.0),
                        );
                        if response.lost_focus() {
                            if ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                                committed = Some((marker.id, text.clone()));
                            }
                            self.marker_edit = None;
                        }
                    }
                } else {
                    let label = ui.add(
                        egui::Label::new(timeparse::format_time(marker.time))
                            .sense(egui::Sense::click()),
                    );
                    if label.double_clicked() {
                        self.marker_edit =
                            Some((marker.id, timeparse::format_time(marker.time)));
                    }
                }
                let linked_title = self
                    .linker
                    .scene_for_marker(marker.id)
                    .and_then(|sid| self.doc.scene(sid))
                    .map(|s| s.title.clone());
                match linked_title {
                    Some(title) => {
                        ui.label(format!("→ {title}"));
                    }
                    None => {
                        ui.label(egui::RichText::new("unlinked").weak());
                    }
                }
                if ui.small_button("🗑").clicked() {
                    removed = Some(marker.id);
                }
            });
        }
        if let Some((id, text)) = committed {
            // rejected input leaves the marker where it was
            match timeparse::parse_time(&text) {
                Ok(time) => match self.markers.set_time(id, time) {
                    Ok(_) => self.bus.emit(EditorSignal::MarkerReindexed {
                        times: self.markers.times(),
                    }),
                    Err(err) => self.status = Some(err.to_string()),
                },
                Err(err) => self.status = Some(format!("invalid time {text:?}: {err}")),
            }
        }
        if let Some(id) = removed {
            match self.markers.remove_marker(id) {
                Ok(_) => {
                    self.linker
                        .on_marker_removed(&self.markers, &mut self.doc.scenes, id);
                    self.bus.emit(EditorSignal::MarkerSetChanged);
                }
                Err(err) => self.status = Some(err.to_string()),
            }
        }
    }

    fn scene_strip(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Scenes");
            if ui.button("＋ Add scene").clicked() {
                let n = self.doc.scenes.len() + 1;
                let id = self.doc.add_scene(format!("Scene {n}"));
                self.selected_scene = Some(id);
                self.persist();
            }
        });
        ui.separator();

        let scene_ids: Vec<SceneId> = self.doc.scenes.iter().map(|s| s.id).collect();
        egui::ScrollArea::horizontal().show(ui, |ui| {
            ui.horizontal_top(|ui| {
                for id in scene_ids {
                    self.scene_card(ui, id);
                }
            });
        });
    }

    fn scene_card(&mut self, ui: &mut egui::Ui, id: SceneId) {
        let selected = self.selected_scene == Some(id);
        let is_linked = self.linker.is_linked(id);
        let has_audio = self.has_audio();
        let mut link_clicked = false;
        let mut link_at_playhead = false;
        let mut unlink_clicked = false;
        let mut duplicate_clicked = false;
        let mut remove_clicked = false;
        let mut media_changed = false;
        let mut changed = false;

        let Some(scene) = self.doc.scene_mut(id) else {
            return;
        };
        let frame = egui::Frame::group(ui.style()).fill(if selected {
            ui.visuals().faint_bg_color
        } else {
            ui.visuals().window_fill()
        });
        frame.show(ui, |ui| {
            ui.set_width(220.0);
            ui.vertical(|ui| {
                changed |= ui.text_edit_singleline(&mut scene.title).changed();
                changed |= ui
                    .add(
                        egui::TextEdit::multiline(&mut scene.prompt)
                            .desired_rows(3)
                            .hint_text("Prompt"),
                    )
                    .changed();

                ui.horizontal(|ui| {
                    if ui.button("Image…").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Images", &["png", "jpg", "jpeg", "webp"])
                            .pick_file()
                        {
                            scene.image_path = Some(path);
                            changed = true;
                        }
                    }
                    if ui.button("Video…").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Videos", &["mp4", "mov", "webm", "mkv"])
                            .pick_file()
                        {
                            scene.video_path = Some(path);
                            changed = true;
                        }
                    }
                });

                if is_linked {
                    ui.horizontal(|ui| {
                        let label = scene
                            .audio_marker_time
                            .map(timeparse::format_time)
                            .unwrap_or_default();
                        ui.label(format!("🔗 {label}"));
                        let mut media = scene.preferred_media_type;
                        egui::ComboBox::from_id_salt(("media", id))
                            .selected_text(media.display_name())
                            .show_ui(ui, |ui| {
                                for candidate in [MediaType::Image, MediaType::Video] {
                                    ui.selectable_value(
                                        &mut media,
                                        candidate,
                                        candidate.display_name(),
                                    );
                                }
                            });
                        if media != scene.preferred_media_type {
                            scene.preferred_media_type = media;
                            media_changed = true;
                        }
                    });
                    if ui.button("Unlink").clicked() {
                        unlink_clicked = true;
                    }
                } else if has_audio {
                    ui.horizontal(|ui| {
                        if ui.button("Link to marker…").clicked() {
                            link_clicked = true;
                        }
                        if ui.button("Link at playhead").clicked() {
                            link_at_playhead = true;
                        }
                    });
                }

                ui.horizontal(|ui| {
                    if ui.small_button("Duplicate").clicked() {
                        duplicate_clicked = true;
                    }
                    if ui.small_button("Remove").clicked() {
                        remove_clicked = true;
                    }
                });
            });
        });

        let marker_index = self
            .doc
            .scene(id)
            .and_then(|s| s.audio_marker_index);
        let preferred = self
            .doc
            .scene(id)
            .map(|s| s.preferred_media_type)
            .unwrap_or_default();

        if changed {
            self.selected_scene = Some(id);
            self.persist();
        }
        if media_changed {
            if let Some(marker_index) = marker_index {
                self.bus.emit(EditorSignal::MediaTypeChanged {
                    marker_index,
                    media_type: preferred,
                });
            } else {
                self.persist();
            }
        }
        if link_clicked {
            self.linker.start_linkage(id);
        }
        if link_at_playhead {
            let time = self.audio.as_ref().map(|e| e.position()).unwrap_or(0.0);
            self.bus
                .emit(EditorSignal::SceneLinkRequested { scene_id: id, time });
        }
        if unlink_clicked {
            match marker_index {
                Some(marker_index) => {
                    self.bus
                        .emit(EditorSignal::SceneUnlinkRequested { marker_index });
                }
                None => {
                    self.linker.unlink_scene(&mut self.doc.scenes, id);
                    self.persist();
                }
            }
        }
        if duplicate_clicked {
            match self.doc.duplicate_scene(id) {
                Ok(new_id) => {
                    self.selected_scene = Some(new_id);
                    self.persist();
                }
                Err(err) => self.status = Some(err.to_string()),
            }
        }
        if remove_clicked {
            if self.linker.is_linked(id) {
                self.linker.unlink_scene(&mut self.doc.scenes, id);
            }
            match self.doc.remove_scene(id) {
                Ok(_) => {
                    if self.selected_scene == Some(id) {
                        self.selected_scene = self.doc.scenes.first().map(|s| s.id);
                    }
                    self.persist();
                }
                Err(err) => self.status = Some(err.to_string()),
            }
        }
    }

    fn drive_presentation(&mut self, ctx: &egui::Context) {
        if !self.session.is_open() {
            return;
        }

        // audio-driven modes follow the narration clock
        if let Some(engine) = &self.audio {
            if self
                .session
                .mode()
                .map(|m| m.is_audio_driven())
                .unwrap_or(false)
            {
                let times = self.markers.times();
                if let Some(scene_index) = self.session.sample_clock(
                    &self.doc.scenes,
                    &times,
                    engine.position(),
                    &mut self.presentation,
                ) {
                    self.bus
                        .emit(EditorSignal::ActiveSceneChanged { scene_index });
                }
                if engine.is_playing() {
                    ctx.request_repaint();
                }
            }
        }

        // combined mode advances its own segment clock
        let dt = ctx.input(|i| i.stable_dt) as f64;
        if let Some(PresentationAction::SegmentFinished) =
            self.presentation.tick(ctx, &mut self.cache, dt)
        {
            if !self.session.segment_finished(&mut self.presentation) {
                self.presentation.set_segment_playing(false);
            }
        }

        self.presentation
            .fulfill_loads(ctx, &mut self.cache, &self.session);

        let audio_position = self.audio.as_ref().map(|e| e.position());
        let actions = self
            .presentation
            .window(ctx, &self.session, self.has_audio(), audio_position);
        for action in actions {
            match action {
                PresentationAction::ModeSelected(mode) => {
                    let entered = self.session.enter(
                        mode,
                        &self.doc.scenes,
                        self.has_audio(),
                        &FfProber,
                        &mut self.presentation,
                    );
                    if entered != mode {
                        self.status = Some(format!(
                            "{} unavailable, showing images",
                            mode.display_name()
                        ));
                    }
                }
                PresentationAction::Close => {
                    self.session.close(&mut self.presentation);
                    self.presentation.release_textures(&mut self.cache);
                }
                PresentationAction::SeekRequested(percentage) => {
                    self.bus
                        .emit(EditorSignal::SegmentSeekRequested { percentage });
                }
                PresentationAction::NextSegment => {
                    self.session.next_segment(&mut self.presentation);
                }
                PresentationAction::PreviousSegment => {
                    self.session.previous_segment(&mut self.presentation);
                }
                PresentationAction::SegmentFinished => {
                    if !self.session.segment_finished(&mut self.presentation) {
                        self.presentation.set_segment_playing(false);
                    }
                }
            }
        }
    }
}

impl eframe::App for StoryboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_decode();
        if self.decode_rx.is_some() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            self.top_bar(ui);
        });

        egui::SidePanel::right("marker_list")
            .default_width(220.0)
            .show(ctx, |ui| {
                self.marker_list(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.transport(ui);
            self.waveform_section(ui);
            ui.add_space(8.0);
            self.scene_strip(ui);
        });

        self.drive_presentation(ctx);
        self.drain_signals();

        // keep the playhead moving while narration plays
        if self.audio.as_ref().map(|e| e.is_playing()).unwrap_or(false) {
            ctx.request_repaint();
        }
    }
}
