use crate::{
    resolve_active_scene, ClipProber, PlayheadResolver, SeekTarget, SegmentTimeline, Seconds,
    VideoSegment,
};
use project::{MediaType, Scene};
use tracing::{debug, warn};

/// Playback strategy for the presentation window. `Closed` is represented by
/// the session holding no mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationMode {
    /// Still image per scene, manual navigation.
    Image,
    /// The current scene's own video clip.
    LinkedVideo,
    /// All scene clips stitched on one seekable global timeline.
    CombinedVideo,
    /// Narration audio drives scene switching; scenes show images.
    AudioImage,
    /// Narration audio drives scene switching; scenes show videos.
    AudioVideo,
    /// Narration audio drives scene switching; each scene's preferred media.
    AudioMixed,
}

impl PresentationMode {
    pub fn display_name(self) -> &'static str {
        match self {
            PresentationMode::Image => "Images",
            PresentationMode::LinkedVideo => "Scene video",
            PresentationMode::CombinedVideo => "Combined video",
            PresentationMode::AudioImage => "Audio + images",
            PresentationMode::AudioVideo => "Audio + videos",
            PresentationMode::AudioMixed => "Audio + mixed",
        }
    }

    pub fn is_audio_driven(self) -> bool {
        matches!(
            self,
            PresentationMode::AudioImage
                | PresentationMode::AudioVideo
                | PresentationMode::AudioMixed
        )
    }

    pub const ALL: [PresentationMode; 6] = [
        PresentationMode::Image,
        PresentationMode::LinkedVideo,
        PresentationMode::CombinedVideo,
        PresentationMode::AudioImage,
        PresentationMode::AudioVideo,
        PresentationMode::AudioMixed,
    ];
}

/// Which preview container is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSurface {
    Image,
    Video,
}

impl From<MediaType> for MediaSurface {
    fn from(media: MediaType) -> Self {
        match media {
            MediaType::Image => MediaSurface::Image,
            MediaType::Video => MediaSurface::Video,
        }
    }
}

/// Side-effect seam between the state machine and the preview media slots.
/// The UI owns the actual surfaces; the session guarantees `pause_all` runs
/// synchronously before any new mode's media is touched, so two modes never
/// race for the output.
pub trait MediaController {
    fn pause_all(&mut self);
    fn show_surface(&mut self, surface: MediaSurface);
    /// `seq` is the session's load sequence; completions arriving with a
    /// stale sequence must be dropped by the controller.
    fn load_scene_media(&mut self, scene: &Scene, media: MediaType, seq: u64);
    fn load_segment(&mut self, segment: &VideoSegment, local_time: Seconds, seq: u64);
    fn detach_all(&mut self);
}

/// Ephemeral per-sample playback state, recomputed on every clock sample or
/// segment change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackCursor {
    pub current_time: Seconds,
    pub active_marker_index: Option<usize>,
    pub active_scene_index: usize,
    pub current_segment_index: Option<usize>,
}

/// Presentation orchestrator owning the per-session context: resolver,
/// combined timeline, scene cursor, and the stale-load guard. Everything
/// here is initialized on `enter` and torn down on `close`.
#[derive(Debug, Default)]
pub struct PresentationSession {
    mode: Option<PresentationMode>,
    resolver: PlayheadResolver,
    segments: Option<SegmentTimeline>,
    current_scene: usize,
    current_time: Seconds,
    load_seq: u64,
}

impl PresentationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Option<PresentationMode> {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.mode.is_some()
    }

    pub fn current_scene_index(&self) -> usize {
        self.current_scene
    }

    pub fn set_current_scene(&mut self, index: usize) {
        self.current_scene = index;
    }

    pub fn segments(&self) -> Option<&SegmentTimeline> {
        self.segments.as_ref().filter(|t| !t.is_empty())
    }

    /// True while `seq` is the newest issued load. Completions failing this
    /// check were superseded by a later transition and must be ignored.
    pub fn is_load_current(&self, seq: u64) -> bool {
        seq == self.load_seq
    }

    pub fn cursor(&self) -> PlaybackCursor {
        PlaybackCursor {
            current_time: self.current_time,
            active_marker_index: self.resolver.last_resolved(),
            active_scene_index: self.current_scene,
            current_segment_index: self.segments.as_ref().map(|s| s.current_index()),
        }
    }

    /// Switches modes. The previous mode's media is paused synchronously
    /// before any new-mode setup; a mode without usable data reverts to
    /// `Image` rather than entering a broken state. Returns the mode that
    /// actually became active.
    pub fn enter(
        &mut self,
        requested: PresentationMode,
        scenes: &[Scene],
        has_audio: bool,
        prober: &dyn ClipProber,
        ctl: &mut dyn MediaController,
    ) -> PresentationMode {
        ctl.pause_all();
        self.segments = None;
        self.resolver.reset();
        self.load_seq += 1;
        if self.current_scene >= scenes.len() {
            self.current_scene = 0;
        }

        let mode = match self.try_enter(requested, scenes, has_audio, prober, ctl) {
            Ok(mode) => mode,
            Err(reason) => {
                warn!(requested = requested.display_name(), reason, "presentation mode unavailable, reverting to images");
                self.show_current_scene(scenes, MediaType::Image, ctl);
                PresentationMode::Image
            }
        };
        debug!(mode = mode.display_name(), "presentation mode entered");
        self.mode = Some(mode);
        mode
    }

    fn try_enter(
        &mut self,
        requested: PresentationMode,
        scenes: &[Scene],
        has_audio: bool,
        prober: &dyn ClipProber,
        ctl: &mut dyn MediaController,
    ) -> Result<PresentationMode, &'static str> {
        if scenes.is_empty() {
            return Err("no scenes");
        }
        match requested {
            PresentationMode::Image => {
                self.show_current_scene(scenes, MediaType::Image, ctl);
            }
            PresentationMode::LinkedVideo => {
                if scenes[self.current_scene].video_path.is_none() {
                    return Err("current scene has no video");
                }
                self.show_current_scene(scenes, MediaType::Video, ctl);
            }
            PresentationMode::CombinedVideo => {
                let timeline = SegmentTimeline::build(scenes, prober)
                    .ok_or("no playable video segments")?;
                let first = timeline.segments()[0].clone();
                self.segments = Some(timeline);
                self.load_seq += 1;
                ctl.show_surface(MediaSurface::Video);
                ctl.load_segment(&first, 0.0, self.load_seq);
            }
            PresentationMode::AudioImage
            | PresentationMode::AudioVideo
            | PresentationMode::AudioMixed => {
                if !has_audio {
                    return Err("no audio timeline loaded");
                }
                let media = self.audio_mode_media(requested, scenes);
                self.show_current_scene(scenes, media, ctl);
            }
        }
        Ok(requested)
    }

    /// Leaves presentation: pause, detach every media source, drop the
    /// ephemeral segment/cursor state.
    pub fn close(&mut self, ctl: &mut dyn MediaController) {
        ctl.pause_all();
        ctl.detach_all();
        self.mode = None;
        self.segments = None;
        self.resolver.reset();
        self.current_time = 0.0;
        self.load_seq += 1;
    }

    /// Feeds one audio clock sample through the resolver. Returns the newly
    /// active scene index on an actual marker crossing, `None` otherwise —
    /// media is only reloaded on crossings, never per sample.
    pub fn sample_clock(
        &mut self,
        scenes: &[Scene],
        markers: &[Seconds],
        current_time: Seconds,
        ctl: &mut dyn MediaController,
    ) -> Option<usize> {
        let mode = self.mode?;
        if !mode.is_audio_driven() {
            return None;
        }
        self.current_time = current_time;
        let transition = self.resolver.tick(markers, current_time)?;
        let marker_index = transition.to.map(|i| i as i64).unwrap_or(-1);
        let scene_index = resolve_active_scene(scenes, marker_index, self.current_scene);
        self.current_scene = scene_index;
        let media = self.audio_mode_media(mode, scenes);
        self.show_current_scene(scenes, media, ctl);
        Some(scene_index)
    }

    /// Combined-mode percentage seek from the global seek bar.
    pub fn seek_segments(
        &mut self,
        percentage: f64,
        ctl: &mut dyn MediaController,
    ) -> Option<SeekTarget> {
        if self.mode != Some(PresentationMode::CombinedVideo) {
            return None;
        }
        let timeline = self.segments.as_mut()?;
        let target = timeline.seek(percentage)?;
        let segment = timeline.segments()[target.segment_index].clone();
        self.load_seq += 1;
        ctl.load_segment(&segment, target.local_time, self.load_seq);
        Some(target)
    }

    /// Called when the current segment's clip ends. Steps forward and loads
    /// the next clip from its start; on the last segment playback stops.
    pub fn segment_finished(&mut self, ctl: &mut dyn MediaController) -> bool {
        self.step_segment(true, ctl)
    }

    pub fn next_segment(&mut self, ctl: &mut dyn MediaController) -> bool {
        self.step_segment(true, ctl)
    }

    pub fn previous_segment(&mut self, ctl: &mut dyn MediaController) -> bool {
        self.step_segment(false, ctl)
    }

    fn step_segment(&mut self, forward: bool, ctl: &mut dyn MediaController) -> bool {
        if self.mode != Some(PresentationMode::CombinedVideo) {
            return false;
        }
        let Some(timeline) = self.segments.as_mut() else {
            return false;
        };
        let next = if forward {
            timeline.advance().cloned()
        } else {
            timeline.retreat().cloned()
        };
        match next {
            Some(segment) => {
                self.load_seq += 1;
                ctl.load_segment(&segment, 0.0, self.load_seq);
                true
            }
            None => false,
        }
    }

    fn audio_mode_media(&self, mode: PresentationMode, scenes: &[Scene]) -> MediaType {
        match mode {
            PresentationMode::AudioImage => MediaType::Image,
            PresentationMode::AudioVideo => MediaType::Video,
            PresentationMode::AudioMixed => scenes
                .get(self.current_scene)
                .map(|s| s.preferred_media_type)
                .unwrap_or_default(),
            _ => MediaType::Image,
        }
    }

    fn show_current_scene(
        &mut self,
        scenes: &[Scene],
        media: MediaType,
        ctl: &mut dyn MediaController,
    ) {
        let Some(scene) = scenes.get(self.current_scene) else {
            return;
        };
        self.load_seq += 1;
        ctl.show_surface(media.into());
        ctl.load_scene_media(scene, media, self.load_seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::tests::{doc_with_videos, TableProber};
    use crate::ClipProbeError;
    use project::StoryboardDoc;
    use std::collections::HashMap;
    use std::path::Path;

    #[derive(Debug, PartialEq)]
    enum Call {
        PauseAll,
        ShowSurface(MediaSurface),
        LoadScene(MediaType, u64),
        LoadSegment(usize, u64),
        DetachAll,
    }

    #[derive(Default)]
    struct RecordingController {
        calls: Vec<Call>,
    }

    impl MediaController for RecordingController {
        fn pause_all(&mut self) {
            self.calls.push(Call::PauseAll);
        }
        fn show_surface(&mut self, surface: MediaSurface) {
            self.calls.push(Call::ShowSurface(surface));
        }
        fn load_scene_media(&mut self, _scene: &Scene, media: MediaType, seq: u64) {
            self.calls.push(Call::LoadScene(media, seq));
        }
        fn load_segment(&mut self, segment: &VideoSegment, _local_time: Seconds, seq: u64) {
            let index = segment.start_time as usize;
            self.calls.push(Call::LoadSegment(index, seq));
        }
        fn detach_all(&mut self) {
            self.calls.push(Call::DetachAll);
        }
    }

    struct NoProbe;
    impl ClipProber for NoProbe {
        fn probe_duration(&self, path: &Path) -> Result<Seconds, ClipProbeError> {
            Err(ClipProbeError(format!("unreadable: {}", path.display())))
        }
    }

    fn audio_doc() -> StoryboardDoc {
        let mut doc = StoryboardDoc::default();
        for (title, index, time) in [("A", 0, 0.0), ("B", 1, 5.0), ("C", 2, 12.0)] {
            let id = doc.add_scene(title);
            doc.scene_mut(id).unwrap().set_audio_link(index, time);
        }
        doc
    }

    #[test]
    fn test_enter_pauses_before_loading() {
        let doc = audio_doc();
        let mut session = PresentationSession::new();
        let mut ctl = RecordingController::default();

        session.enter(PresentationMode::Image, &doc.scenes, false, &NoProbe, &mut ctl);
        assert_eq!(ctl.calls[0], Call::PauseAll);
        assert!(matches!(ctl.calls[1], Call::ShowSurface(MediaSurface::Image)));
        assert!(matches!(ctl.calls[2], Call::LoadScene(MediaType::Image, _)));
    }

    #[test]
    fn test_combined_mode_without_segments_reverts_to_image() {
        let doc = audio_doc();
        let mut session = PresentationSession::new();
        let mut ctl = RecordingController::default();

        let mode = session.enter(
            PresentationMode::CombinedVideo,
            &doc.scenes,
            false,
            &NoProbe,
            &mut ctl,
        );
        assert_eq!(mode, PresentationMode::Image);
        assert_eq!(session.mode(), Some(PresentationMode::Image));
        assert!(session.segments().is_none());
    }

    #[test]
    fn test_audio_mode_requires_audio() {
        let doc = audio_doc();
        let mut session = PresentationSession::new();
        let mut ctl = RecordingController::default();

        let mode = session.enter(
            PresentationMode::AudioImage,
            &doc.scenes,
            false,
            &NoProbe,
            &mut ctl,
        );
        assert_eq!(mode, PresentationMode::Image);
    }

    #[test]
    fn test_combined_mode_loads_first_segment() {
        let (doc, prober) = doc_with_videos(&[("a", Some(3.0)), ("b", Some(4.0))]);
        let mut session = PresentationSession::new();
        let mut ctl = RecordingController::default();

        let mode = session.enter(
            PresentationMode::CombinedVideo,
            &doc.scenes,
            false,
            &prober,
            &mut ctl,
        );
        assert_eq!(mode, PresentationMode::CombinedVideo);
        assert!(session.segments().is_some());
        assert!(ctl
            .calls
            .iter()
            .any(|c| matches!(c, Call::LoadSegment(0, _))));
    }

    #[test]
    fn test_scene_change_fires_once_per_crossing() {
        let doc = audio_doc();
        let markers = [0.0, 5.0, 12.0];
        let mut session = PresentationSession::new();
        let mut ctl = RecordingController::default();
        session.enter(PresentationMode::AudioImage, &doc.scenes, true, &NoProbe, &mut ctl);

        ctl.calls.clear();
        assert_eq!(
            session.sample_clock(&doc.scenes, &markers, 0.2, &mut ctl),
            Some(0)
        );
        for t in [0.5, 1.0, 3.0, 4.9] {
            assert_eq!(session.sample_clock(&doc.scenes, &markers, t, &mut ctl), None);
        }
        assert_eq!(
            session.sample_clock(&doc.scenes, &markers, 5.2, &mut ctl),
            Some(1)
        );

        let loads = ctl
            .calls
            .iter()
            .filter(|c| matches!(c, Call::LoadScene(_, _)))
            .count();
        assert_eq!(loads, 2);
    }

    #[test]
    fn test_stale_load_guard() {
        let doc = audio_doc();
        let markers = [0.0, 5.0];
        let mut session = PresentationSession::new();
        let mut ctl = RecordingController::default();
        session.enter(PresentationMode::AudioImage, &doc.scenes, true, &NoProbe, &mut ctl);

        session.sample_clock(&doc.scenes, &markers, 0.1, &mut ctl);
        let first_seq = match ctl.calls.last() {
            Some(Call::LoadScene(_, seq)) => *seq,
            other => panic!("expected scene load, got {other:?}"),
        };
        assert!(session.is_load_current(first_seq));

        // A newer transition supersedes the in-flight load.
        session.sample_clock(&doc.scenes, &markers, 6.0, &mut ctl);
        assert!(!session.is_load_current(first_seq));
    }

    #[test]
    fn test_seek_and_segment_stepping() {
        let (doc, prober) = doc_with_videos(&[
            ("a", Some(3.0)),
            ("b", Some(4.0)),
            ("c", Some(2.0)),
        ]);
        let mut session = PresentationSession::new();
        let mut ctl = RecordingController::default();
        session.enter(
            PresentationMode::CombinedVideo,
            &doc.scenes,
            false,
            &prober,
            &mut ctl,
        );

        let target = session.seek_segments(50.0, &mut ctl).unwrap();
        assert_eq!(target.segment_index, 1);
        assert_eq!(session.cursor().current_segment_index, Some(1));

        assert!(session.segment_finished(&mut ctl));
        assert_eq!(session.cursor().current_segment_index, Some(2));
        // last segment: finishing stops rather than wrapping
        assert!(!session.segment_finished(&mut ctl));
        assert!(session.previous_segment(&mut ctl));
    }

    #[test]
    fn test_close_detaches_and_clears() {
        let (doc, prober) = doc_with_videos(&[("a", Some(3.0))]);
        let mut session = PresentationSession::new();
        let mut ctl = RecordingController::default();
        session.enter(
            PresentationMode::CombinedVideo,
            &doc.scenes,
            false,
            &prober,
            &mut ctl,
        );

        session.close(&mut ctl);
        assert!(!session.is_open());
        assert!(session.segments().is_none());
        assert_eq!(ctl.calls.last(), Some(&Call::DetachAll));
    }

    #[test]
    fn test_mixed_mode_follows_scene_preference() {
        let mut doc = audio_doc();
        doc.scenes[1].preferred_media_type = MediaType::Video;
        let markers = [0.0, 5.0, 12.0];
        let mut session = PresentationSession::new();
        let mut ctl = RecordingController::default();
        session.enter(PresentationMode::AudioMixed, &doc.scenes, true, &NoProbe, &mut ctl);

        session.sample_clock(&doc.scenes, &markers, 6.0, &mut ctl);
        assert!(matches!(
            ctl.calls.last(),
            Some(Call::LoadScene(MediaType::Video, _))
        ));
        assert!(matches!(
            ctl.calls[ctl.calls.len() - 2],
            Call::ShowSurface(MediaSurface::Video)
        ));
    }

    #[test]
    fn test_table_prober_is_shared_fixture() {
        // keep the shared fixture exercised from this module too
        let prober = TableProber(HashMap::new());
        assert!(prober.probe_duration(Path::new("/missing.mp4")).is_err());
    }
}
