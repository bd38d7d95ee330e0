use crate::Seconds;
use project::{Scene, SceneId};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Tolerance for float accumulation across segment boundaries.
pub const SEGMENT_EPSILON: Seconds = 1e-6;

#[derive(Debug, Error)]
#[error("clip probe failed: {0}")]
pub struct ClipProbeError(pub String);

/// Duration probing seam. The desktop app backs this with ffprobe; tests use
/// a fixed table.
pub trait ClipProber {
    fn probe_duration(&self, path: &Path) -> Result<Seconds, ClipProbeError>;
}

/// One scene's clip placed at a computed offset on the synthetic combined
/// timeline. Ephemeral: rebuilt from scratch on every entry into
/// combined-video mode, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSegment {
    pub scene_id: SceneId,
    pub path: PathBuf,
    pub start_time: Seconds,
    pub end_time: Seconds,
    pub duration: Seconds,
}

/// Where a percentage seek landed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekTarget {
    pub segment_index: usize,
    pub local_time: Seconds,
}

/// Contiguous layout of every playable scene clip on one global timeline.
///
/// Invariants: `segments[i].end_time == segments[i+1].start_time` and the
/// durations sum to `total_duration` within `SEGMENT_EPSILON`.
#[derive(Debug, Clone, Default)]
pub struct SegmentTimeline {
    segments: Vec<VideoSegment>,
    total_duration: Seconds,
    current: usize,
}

impl SegmentTimeline {
    /// Lays out the clips of all scenes that have a video, in storyboard
    /// order. A clip that fails to probe is skipped with a warning — one bad
    /// clip never aborts the whole timeline. Returns `None` when no segment
    /// survives; the caller must fall back to a non-video mode.
    pub fn build(scenes: &[Scene], prober: &dyn ClipProber) -> Option<Self> {
        let mut segments = Vec::new();
        let mut running_total: Seconds = 0.0;
        for scene in scenes {
            let Some(path) = scene.video_path.as_deref() else {
                continue;
            };
            let duration = match prober.probe_duration(path) {
                Ok(d) if d > 0.0 => d,
                Ok(d) => {
                    warn!(scene = %scene.id, path = %path.display(), duration = d, "skipping clip with non-positive duration");
                    continue;
                }
                Err(err) => {
                    warn!(scene = %scene.id, path = %path.display(), error = %err, "skipping unreadable clip");
                    continue;
                }
            };
            segments.push(VideoSegment {
                scene_id: scene.id,
                path: path.to_path_buf(),
                start_time: running_total,
                end_time: running_total + duration,
                duration,
            });
            running_total += duration;
        }
        if segments.is_empty() {
            return None;
        }
        debug!(
            segments = segments.len(),
            total = running_total,
            "combined timeline built"
        );
        Some(Self {
            segments,
            total_duration: running_total,
            current: 0,
        })
    }

    pub fn segments(&self) -> &[VideoSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_duration(&self) -> Seconds {
        self.total_duration
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_segment(&self) -> Option<&VideoSegment> {
        self.segments.get(self.current)
    }

    /// Global position of a local time within the current segment, as a
    /// percentage of the total duration (drives the seek bar).
    pub fn global_percentage(&self, local_time: Seconds) -> f64 {
        let Some(segment) = self.current_segment() else {
            return 0.0;
        };
        if self.total_duration <= 0.0 {
            return 0.0;
        }
        ((segment.start_time + local_time) / self.total_duration * 100.0).clamp(0.0, 100.0)
    }

    /// Resolves a global percentage to (segment, local time) and makes that
    /// segment current. Linear scan; segment counts are small.
    pub fn seek(&mut self, percentage: f64) -> Option<SeekTarget> {
        if self.segments.is_empty() || self.total_duration <= 0.0 {
            return None;
        }
        let target = percentage.clamp(0.0, 100.0) / 100.0 * self.total_duration;
        let index = self
            .segments
            .iter()
            .position(|s| target >= s.start_time && target < s.end_time)
            // target == total_duration lands past every half-open span
            .unwrap_or(self.segments.len() - 1);
        self.current = index;
        let segment = &self.segments[index];
        Some(SeekTarget {
            segment_index: index,
            local_time: (target - segment.start_time).max(0.0),
        })
    }

    pub fn set_current(&mut self, index: usize) -> bool {
        if index < self.segments.len() {
            self.current = index;
            true
        } else {
            false
        }
    }

    /// Steps to the next segment (segment end or user navigation). Every
    /// step is a full media reload on the caller's side; there is no
    /// cross-segment buffering.
    pub fn advance(&mut self) -> Option<&VideoSegment> {
        if self.current + 1 < self.segments.len() {
            self.current += 1;
            self.segments.get(self.current)
        } else {
            None
        }
    }

    pub fn retreat(&mut self) -> Option<&VideoSegment> {
        if self.current > 0 {
            self.current -= 1;
            self.segments.get(self.current)
        } else {
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use project::StoryboardDoc;
    use std::collections::HashMap;

    /// Probe stub mapping paths to durations; missing entries fail.
    pub(crate) struct TableProber(pub HashMap<PathBuf, Seconds>);

    impl ClipProber for TableProber {
        fn probe_duration(&self, path: &Path) -> Result<Seconds, ClipProbeError> {
            self.0
                .get(path)
                .copied()
                .ok_or_else(|| ClipProbeError(format!("unreadable: {}", path.display())))
        }
    }

    pub(crate) fn doc_with_videos(durations: &[(&str, Option<Seconds>)]) -> (StoryboardDoc, TableProber) {
        let mut doc = StoryboardDoc::default();
        let mut table = HashMap::new();
        for (name, duration) in durations {
            let id = doc.add_scene(*name);
            let path = PathBuf::from(format!("/media/{name}.mp4"));
            doc.scene_mut(id).unwrap().video_path = Some(path.clone());
            if let Some(d) = duration {
                table.insert(path, *d);
            }
        }
        (doc, TableProber(table))
    }

    #[test]
    fn test_contiguous_layout() {
        let (doc, prober) = doc_with_videos(&[
            ("a", Some(3.0)),
            ("b", Some(4.0)),
            ("c", Some(2.0)),
        ]);
        let timeline = SegmentTimeline::build(&doc.scenes, &prober).unwrap();

        let spans: Vec<(Seconds, Seconds)> = timeline
            .segments()
            .iter()
            .map(|s| (s.start_time, s.end_time))
            .collect();
        assert_eq!(spans, vec![(0.0, 3.0), (3.0, 7.0), (7.0, 9.0)]);
        assert!((timeline.total_duration() - 9.0).abs() < SEGMENT_EPSILON);

        let summed: Seconds = timeline.segments().iter().map(|s| s.duration).sum();
        assert!((summed - timeline.total_duration()).abs() < SEGMENT_EPSILON);
        for pair in timeline.segments().windows(2) {
            assert!((pair[0].end_time - pair[1].start_time).abs() < SEGMENT_EPSILON);
        }
    }

    #[test]
    fn test_seek_resolves_segment_and_local_time() {
        let (doc, prober) = doc_with_videos(&[
            ("a", Some(3.0)),
            ("b", Some(4.0)),
            ("c", Some(2.0)),
        ]);
        let mut timeline = SegmentTimeline::build(&doc.scenes, &prober).unwrap();

        // 50% of 9s = 4.5s -> second segment at local 1.5s
        let target = timeline.seek(50.0).unwrap();
        assert_eq!(target.segment_index, 1);
        assert!((target.local_time - 1.5).abs() < SEGMENT_EPSILON);
        assert_eq!(timeline.current_index(), 1);

        let start = timeline.seek(0.0).unwrap();
        assert_eq!(start.segment_index, 0);
        assert!(start.local_time.abs() < SEGMENT_EPSILON);

        // 100% clamps into the last segment
        let end = timeline.seek(100.0).unwrap();
        assert_eq!(end.segment_index, 2);
    }

    #[test]
    fn test_partial_build_skips_bad_clip() {
        let (doc, prober) = doc_with_videos(&[
            ("a", Some(3.0)),
            ("broken", None),
            ("c", Some(2.0)),
        ]);
        let timeline = SegmentTimeline::build(&doc.scenes, &prober).unwrap();
        assert_eq!(timeline.len(), 2);
        assert!((timeline.total_duration() - 5.0).abs() < SEGMENT_EPSILON);
        // layout stays contiguous across the gap
        assert_eq!(timeline.segments()[1].start_time, 3.0);
    }

    #[test]
    fn test_empty_build_returns_none() {
        let (doc, prober) = doc_with_videos(&[("broken", None)]);
        assert!(SegmentTimeline::build(&doc.scenes, &prober).is_none());

        let empty = StoryboardDoc::default();
        assert!(SegmentTimeline::build(&empty.scenes, &prober).is_none());
    }

    #[test]
    fn test_scenes_without_video_are_ignored() {
        let (mut doc, prober) = doc_with_videos(&[("a", Some(3.0))]);
        doc.add_scene("image-only");
        let timeline = SegmentTimeline::build(&doc.scenes, &prober).unwrap();
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_advance_retreat_bounds() {
        let (doc, prober) = doc_with_videos(&[("a", Some(1.0)), ("b", Some(1.0))]);
        let mut timeline = SegmentTimeline::build(&doc.scenes, &prober).unwrap();

        assert!(timeline.retreat().is_none());
        assert!(timeline.advance().is_some());
        assert_eq!(timeline.current_index(), 1);
        assert!(timeline.advance().is_none());
        assert_eq!(timeline.current_index(), 1);
        assert!(timeline.retreat().is_some());
        assert_eq!(timeline.current_index(), 0);
    }

    #[test]
    fn test_global_percentage() {
        let (doc, prober) = doc_with_videos(&[("a", Some(3.0)), ("b", Some(7.0))]);
        let mut timeline = SegmentTimeline::build(&doc.scenes, &prober).unwrap();
        timeline.set_current(1);
        let pct = timeline.global_percentage(2.0);
        assert!((pct - 50.0).abs() < 1e-9);
    }
}
