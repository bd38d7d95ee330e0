use crate::Seconds;
use project::{MediaType, SceneId};
use tracing::trace;

/// Cross-panel notifications. Scene-side panels and the waveform editor
/// never call into each other directly; they communicate through these.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorSignal {
    /// Markers were added, removed, or re-sorted. Coarse-grained on purpose:
    /// listeners re-read the store instead of diffing.
    MarkerSetChanged,
    /// A scene asked to be linked to a marker at `time` (pending-link flow).
    SceneLinkRequested { scene_id: SceneId, time: Seconds },
    /// A scene asked to drop its marker association. The marker survives.
    SceneUnlinkRequested { marker_index: usize },
    /// Marker order changed while links were held by index; carries the
    /// re-sorted times so listeners can refresh their labels.
    MarkerReindexed { times: Vec<Seconds> },
    /// The audio-driven playhead crossed into another scene's span.
    ActiveSceneChanged { scene_index: usize },
    /// A linked scene's preferred media flipped between image and video.
    MediaTypeChanged {
        marker_index: usize,
        media_type: MediaType,
    },
    /// The combined-video seek bar was dragged to a global percentage.
    SegmentSeekRequested { percentage: f64 },
}

impl EditorSignal {
    fn kind(&self) -> &'static str {
        match self {
            EditorSignal::MarkerSetChanged => "marker_set_changed",
            EditorSignal::SceneLinkRequested { .. } => "scene_link_requested",
            EditorSignal::SceneUnlinkRequested { .. } => "scene_unlink_requested",
            EditorSignal::MarkerReindexed { .. } => "marker_reindexed",
            EditorSignal::ActiveSceneChanged { .. } => "active_scene_changed",
            EditorSignal::MediaTypeChanged { .. } => "media_type_changed",
            EditorSignal::SegmentSeekRequested { .. } => "segment_seek_requested",
        }
    }
}

type Subscriber = Box<dyn FnMut(&EditorSignal)>;

/// Synchronous fan-out bus. `emit` delivers to every subscriber, in
/// subscription order, before returning; there is no queue and no thread
/// hop, so a signal's effects are fully applied when `emit` returns.
#[derive(Default)]
pub struct SignalBus {
    subscribers: Vec<Subscriber>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&EditorSignal) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn emit(&mut self, signal: EditorSignal) {
        trace!(kind = signal.kind(), "signal emitted");
        for subscriber in &mut self.subscribers {
            subscriber(&signal);
        }
    }
}

impl std::fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_emit_reaches_all_subscribers_in_order() {
        let log: Rc<RefCell<Vec<String>>> = Rc::default();
        let mut bus = SignalBus::new();
        for name in ["first", "second"] {
            let log = Rc::clone(&log);
            bus.subscribe(move |signal| {
                log.borrow_mut().push(format!("{name}:{}", signal.kind()));
            });
        }

        bus.emit(EditorSignal::MarkerSetChanged);
        bus.emit(EditorSignal::SegmentSeekRequested { percentage: 50.0 });

        assert_eq!(
            *log.borrow(),
            vec![
                "first:marker_set_changed",
                "second:marker_set_changed",
                "first:segment_seek_requested",
                "second:segment_seek_requested",
            ]
        );
    }

    #[test]
    fn test_emit_is_synchronous() {
        let seen: Rc<RefCell<Option<EditorSignal>>> = Rc::default();
        let mut bus = SignalBus::new();
        {
            let seen = Rc::clone(&seen);
            bus.subscribe(move |signal| {
                *seen.borrow_mut() = Some(signal.clone());
            });
        }

        bus.emit(EditorSignal::ActiveSceneChanged { scene_index: 3 });
        assert_eq!(
            *seen.borrow(),
            Some(EditorSignal::ActiveSceneChanged { scene_index: 3 })
        );
    }

    #[test]
    fn test_payload_round_trip() {
        let signal = EditorSignal::MediaTypeChanged {
            marker_index: 2,
            media_type: project::MediaType::Video,
        };
        match &signal {
            EditorSignal::MediaTypeChanged {
                marker_index,
                media_type,
            } => {
                assert_eq!(*marker_index, 2);
                assert_eq!(*media_type, project::MediaType::Video);
            }
            other => panic!("unexpected signal {other:?}"),
        }
    }
}
