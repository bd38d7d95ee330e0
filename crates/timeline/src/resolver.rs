use crate::Seconds;
use project::Scene;

/// Greatest marker index `i` with `markers[i] <= current_time`, or `None`
/// while the playhead is ahead of the first marker. `markers` must be
/// ascending (the store guarantees it outside drag sessions).
pub fn resolve_active_marker(markers: &[Seconds], current_time: Seconds) -> Option<usize> {
    if markers.is_empty() || current_time < markers[0] {
        return None;
    }
    Some(markers.partition_point(|&t| t <= current_time) - 1)
}

/// Scene index for an active marker index, or `current_scene` unchanged when
/// no scene links to that marker (orphaned markers are tolerated). Negative
/// indices are clamped to 0.
pub fn resolve_active_scene(
    scenes: &[Scene],
    active_marker_index: i64,
    current_scene: usize,
) -> usize {
    let marker_index = active_marker_index.max(0) as usize;
    scenes
        .iter()
        .position(|s| s.is_audio_linked && s.audio_marker_index == Some(marker_index))
        .unwrap_or(current_scene)
}

/// A marker-span crossing detected by [`PlayheadResolver::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerTransition {
    pub from: Option<usize>,
    pub to: Option<usize>,
}

/// Memoized playhead-to-marker resolution.
///
/// `tick` is cheap enough to call on every clock sample; it reports a
/// transition only when the resolved marker index actually changes, so the
/// scene-change side effect fires once per crossing rather than once per
/// sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayheadResolver {
    // None = unprimed; first tick always reports a transition.
    last: Option<Option<usize>>,
}

impl PlayheadResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the memoized index; the next tick fires unconditionally.
    /// Used when (re-)entering an audio-driven mode or after a seek outside
    /// the clock's control.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn last_resolved(&self) -> Option<usize> {
        self.last.flatten()
    }

    pub fn tick(&mut self, markers: &[Seconds], current_time: Seconds) -> Option<MarkerTransition> {
        let resolved = resolve_active_marker(markers, current_time);
        match self.last {
            Some(previous) if previous == resolved => None,
            previous => {
                self.last = Some(resolved);
                Some(MarkerTransition {
                    from: previous.flatten(),
                    to: resolved,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use project::StoryboardDoc;

    fn linked_doc() -> StoryboardDoc {
        let mut doc = StoryboardDoc::default();
        for (title, index, time) in [("A", 0, 0.0), ("B", 1, 5.0), ("C", 2, 12.0)] {
            let id = doc.add_scene(title);
            doc.scene_mut(id).unwrap().set_audio_link(index, time);
        }
        doc
    }

    #[test]
    fn test_resolve_active_marker() {
        let markers = [0.0, 5.0, 12.0];
        assert_eq!(resolve_active_marker(&markers, 3.0), Some(0));
        assert_eq!(resolve_active_marker(&markers, 7.0), Some(1));
        assert_eq!(resolve_active_marker(&markers, 12.0), Some(2));
        assert_eq!(resolve_active_marker(&markers, 99.0), Some(2));
        assert_eq!(resolve_active_marker(&markers, -1.0), None);
        assert_eq!(resolve_active_marker(&[], 3.0), None);
        assert_eq!(resolve_active_marker(&[2.0], 1.0), None);
    }

    #[test]
    fn test_resolve_active_scene() {
        let doc = linked_doc();
        assert_eq!(resolve_active_scene(&doc.scenes, 0, 9), 0);
        assert_eq!(resolve_active_scene(&doc.scenes, 1, 9), 1);
        assert_eq!(resolve_active_scene(&doc.scenes, 2, 9), 2);
    }

    #[test]
    fn test_negative_index_clamped_to_zero() {
        let doc = linked_doc();
        assert_eq!(resolve_active_scene(&doc.scenes, -1, 9), 0);
    }

    #[test]
    fn test_orphaned_marker_keeps_current_scene() {
        let doc = linked_doc();
        // marker 5 has no linked scene
        assert_eq!(resolve_active_scene(&doc.scenes, 5, 1), 1);
    }

    #[test]
    fn test_tick_fires_once_per_crossing() {
        let markers = [0.0, 5.0, 12.0];
        let mut resolver = PlayheadResolver::new();

        // priming tick
        let first = resolver.tick(&markers, 0.1).unwrap();
        assert_eq!(first.to, Some(0));

        // many samples inside the same span: silent
        for t in [0.5, 1.0, 2.0, 3.0, 4.9] {
            assert_eq!(resolver.tick(&markers, t), None);
        }

        // crossing into the second span fires exactly once
        let crossing = resolver.tick(&markers, 5.01).unwrap();
        assert_eq!(crossing.from, Some(0));
        assert_eq!(crossing.to, Some(1));
        assert_eq!(resolver.tick(&markers, 6.0), None);
    }

    #[test]
    fn test_tick_after_seek_backwards() {
        let markers = [0.0, 5.0, 12.0];
        let mut resolver = PlayheadResolver::new();
        resolver.tick(&markers, 13.0);

        let back = resolver.tick(&markers, 1.0).unwrap();
        assert_eq!(back.from, Some(2));
        assert_eq!(back.to, Some(0));
    }

    #[test]
    fn test_reset_reprimes() {
        let markers = [0.0, 5.0];
        let mut resolver = PlayheadResolver::new();
        resolver.tick(&markers, 1.0);
        assert_eq!(resolver.tick(&markers, 1.5), None);

        resolver.reset();
        assert!(resolver.tick(&markers, 1.5).is_some());
    }
}
