use crate::{MarkerId, MarkerStore};
use project::{Scene, SceneId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Bidirectional scene/marker linkage.
///
/// Links are held by stable `MarkerId` so they survive re-sorts; the
/// positional `audio_marker_index`/`audio_marker_time` fields on each scene
/// are a derived view rewritten by [`SceneLinker::resync`] after every
/// marker mutation. At most one scene links to a given marker.
#[derive(Debug, Clone, Default)]
pub struct SceneLinker {
    links: HashMap<MarkerId, SceneId>,
    pending: Option<SceneId>,
}

impl SceneLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrates links from the persisted positional indices on the scenes.
    /// Scenes pointing at out-of-range indices are defensively unlinked.
    pub fn rebuild(store: &MarkerStore, scenes: &mut [Scene]) -> Self {
        let mut linker = Self::new();
        for scene in scenes.iter_mut() {
            if !scene.is_audio_linked {
                continue;
            }
            let Some(index) = scene.audio_marker_index else {
                scene.clear_audio_link();
                continue;
            };
            let Some(marker_id) = store.id_at(index) else {
                warn!(scene = %scene.id, index, "stored marker index out of range, unlinking");
                scene.clear_audio_link();
                continue;
            };
            if linker.links.contains_key(&marker_id) {
                warn!(scene = %scene.id, index, "marker already linked, unlinking duplicate");
                scene.clear_audio_link();
                continue;
            }
            linker.links.insert(marker_id, scene.id);
        }
        linker.resync(store, scenes);
        linker
    }

    // --- pending-link interaction mode ---

    pub fn pending(&self) -> Option<SceneId> {
        self.pending
    }

    /// Arms the waveform: the next accepted click will bind this scene.
    pub fn start_linkage(&mut self, scene_id: SceneId) {
        self.pending = Some(scene_id);
    }

    /// Cancels the instructional modal / armed state.
    pub fn cancel_linkage(&mut self) {
        self.pending = None;
    }

    /// Consumes the pending scene when an armed waveform click lands.
    pub fn take_pending(&mut self) -> Option<SceneId> {
        self.pending.take()
    }

    // --- link mutations ---

    /// Binds `scene_id` to `marker_id`. A scene previously linked to that
    /// marker, or a previous marker of this scene, is unlinked first.
    pub fn link(
        &mut self,
        store: &MarkerStore,
        scenes: &mut [Scene],
        scene_id: SceneId,
        marker_id: MarkerId,
    ) {
        if let Some(old_marker) = self.marker_for_scene(scene_id) {
            self.links.remove(&old_marker);
        }
        if let Some(previous) = self.links.insert(marker_id, scene_id) {
            if previous != scene_id {
                debug!(scene = %previous, marker = %marker_id, "relinked marker away from scene");
                if let Some(scene) = scenes.iter_mut().find(|s| s.id == previous) {
                    scene.clear_audio_link();
                }
            }
        }
        self.resync(store, scenes);
    }

    /// Unlinks the scene only; the marker stays on the timeline, orphaned
    /// and purely time-based. Distinct from marker removal, which cascades.
    pub fn unlink_scene(&mut self, scenes: &mut [Scene], scene_id: SceneId) {
        self.links.retain(|_, linked| *linked != scene_id);
        if let Some(scene) = scenes.iter_mut().find(|s| s.id == scene_id) {
            scene.clear_audio_link();
        }
    }

    /// Cascade for marker removal: the linked scene (if any) is unlinked but
    /// never deleted. Returns the unlinked scene id.
    pub fn on_marker_removed(
        &mut self,
        store: &MarkerStore,
        scenes: &mut [Scene],
        marker_id: MarkerId,
    ) -> Option<SceneId> {
        let unlinked = self.links.remove(&marker_id);
        if let Some(scene_id) = unlinked {
            if let Some(scene) = scenes.iter_mut().find(|s| s.id == scene_id) {
                scene.clear_audio_link();
            }
        }
        self.resync(store, scenes);
        unlinked
    }

    // --- lookups ---

    pub fn scene_for_marker(&self, marker_id: MarkerId) -> Option<SceneId> {
        self.links.get(&marker_id).copied()
    }

    pub fn marker_for_scene(&self, scene_id: SceneId) -> Option<MarkerId> {
        self.links
            .iter()
            .find(|(_, linked)| **linked == scene_id)
            .map(|(marker, _)| *marker)
    }

    pub fn is_linked(&self, scene_id: SceneId) -> bool {
        self.links.values().any(|linked| *linked == scene_id)
    }

    /// Rewrites every linked scene's positional index and time from the
    /// stable id mapping. Links whose marker no longer exists are dropped
    /// and their scenes unlinked.
    pub fn resync(&mut self, store: &MarkerStore, scenes: &mut [Scene]) {
        let mut dead: Vec<MarkerId> = Vec::new();
        for (&marker_id, &scene_id) in &self.links {
            let Some(index) = store.index_of(marker_id) else {
                dead.push(marker_id);
                if let Some(scene) = scenes.iter_mut().find(|s| s.id == scene_id) {
                    scene.clear_audio_link();
                }
                continue;
            };
            let time = store.get(index).map(|m| m.time).unwrap_or_default();
            if let Some(scene) = scenes.iter_mut().find(|s| s.id == scene_id) {
                scene.set_audio_link(index, time);
            }
        }
        for marker_id in dead {
            self.links.remove(&marker_id);
        }
    }

    /// Linked scenes ordered by marker index. Re-derived on every call,
    /// never cached past a mutation.
    pub fn linked_scenes<'a>(&self, scenes: &'a [Scene]) -> Vec<&'a Scene> {
        let mut linked: Vec<&Scene> = scenes
            .iter()
            .filter(|s| s.is_audio_linked && s.audio_marker_index.is_some())
            .collect();
        linked.sort_by_key(|s| s.audio_marker_index.unwrap_or(usize::MAX));
        linked
    }

    /// Unlinked scenes in original storyboard order.
    pub fn unlinked_scenes<'a>(&self, scenes: &'a [Scene]) -> Vec<&'a Scene> {
        scenes.iter().filter(|s| !s.is_audio_linked).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use project::StoryboardDoc;

    fn fixture() -> (MarkerStore, StoryboardDoc, SceneLinker) {
        let mut store = MarkerStore::new(30.0);
        let mut doc = StoryboardDoc::default();
        doc.add_scene("A");
        doc.add_scene("B");
        doc.add_scene("C");
        let mut linker = SceneLinker::new();
        let ids: Vec<_> = [0.0, 5.0, 12.0]
            .iter()
            .map(|&t| store.add_marker(t))
            .collect();
        for (marker_id, scene_id) in ids
            .iter()
            .zip(doc.scenes.iter().map(|s| s.id).collect::<Vec<_>>())
        {
            linker.link(&store, &mut doc.scenes, scene_id, *marker_id);
        }
        (store, doc, linker)
    }

    #[test]
    fn test_link_writes_derived_fields() {
        let (_store, doc, _linker) = fixture();
        assert_eq!(doc.scenes[0].audio_marker_index, Some(0));
        assert_eq!(doc.scenes[1].audio_marker_index, Some(1));
        assert_eq!(doc.scenes[1].audio_marker_time, Some(5.0));
        assert!(doc.scenes.iter().all(|s| s.is_audio_linked));
    }

    #[test]
    fn test_remove_marker_unlinks_but_keeps_scene() {
        let (mut store, mut doc, mut linker) = fixture();
        let b = doc.scenes[1].id;
        let marker = store.id_at(1).unwrap();

        store.remove_marker(marker).unwrap();
        let unlinked = linker.on_marker_removed(&store, &mut doc.scenes, marker);
        assert_eq!(unlinked, Some(b));

        // B still exists, merely unlinked
        assert_eq!(doc.scenes.len(), 3);
        let scene_b = doc.scene(b).unwrap();
        assert!(!scene_b.is_audio_linked);
        assert_eq!(scene_b.audio_marker_index, None);

        // C shifted down to index 1
        assert_eq!(doc.scenes[2].audio_marker_index, Some(1));
    }

    #[test]
    fn test_unlink_scene_leaves_marker_orphaned() {
        let (store, mut doc, mut linker) = fixture();
        let a = doc.scenes[0].id;

        linker.unlink_scene(&mut doc.scenes, a);
        assert!(!doc.scenes[0].is_audio_linked);
        // marker still on the timeline
        assert_eq!(store.len(), 3);
        assert!(linker.scene_for_marker(store.id_at(0).unwrap()).is_none());
    }

    #[test]
    fn test_resync_after_drag_reorder() {
        let (mut store, mut doc, mut linker) = fixture();
        // Drag the first marker (scene A) past the others.
        store.begin_drag(0).unwrap();
        store.drag_to(20.0).unwrap();
        store.commit_drag().unwrap();
        linker.resync(&store, &mut doc.scenes);

        assert_eq!(doc.scenes[0].audio_marker_index, Some(2));
        assert_eq!(doc.scenes[0].audio_marker_time, Some(20.0));
        assert_eq!(doc.scenes[1].audio_marker_index, Some(0));
        assert_eq!(doc.scenes[2].audio_marker_index, Some(1));
    }

    #[test]
    fn test_one_scene_per_marker() {
        let (store, mut doc, mut linker) = fixture();
        let a = doc.scenes[0].id;
        let b = doc.scenes[1].id;
        let marker_b = linker.marker_for_scene(b).unwrap();

        // Relink A onto B's marker: B loses its link.
        linker.link(&store, &mut doc.scenes, a, marker_b);
        assert_eq!(linker.scene_for_marker(marker_b), Some(a));
        assert!(!doc.scene(b).unwrap().is_audio_linked);
        assert_eq!(doc.scene(a).unwrap().audio_marker_index, Some(1));
    }

    #[test]
    fn test_pending_linkage_flow() {
        let (_store, doc, mut linker) = fixture();
        let c = doc.scenes[2].id;

        linker.start_linkage(c);
        assert_eq!(linker.pending(), Some(c));
        linker.cancel_linkage();
        assert_eq!(linker.pending(), None);

        linker.start_linkage(c);
        assert_eq!(linker.take_pending(), Some(c));
        assert_eq!(linker.pending(), None);
    }

    #[test]
    fn test_rebuild_from_persisted_indices() {
        let (store, mut doc, _linker) = fixture();
        // Simulate a fresh load: only positional fields survive.
        let rebuilt = SceneLinker::rebuild(&store, &mut doc.scenes);
        assert_eq!(
            rebuilt.marker_for_scene(doc.scenes[1].id),
            store.id_at(1)
        );
        assert_eq!(rebuilt.linked_scenes(&doc.scenes).len(), 3);
    }

    #[test]
    fn test_rebuild_drops_out_of_range_index() {
        let store = MarkerStore::new(30.0);
        let mut doc = StoryboardDoc::default();
        let a = doc.add_scene("A");
        doc.scene_mut(a).unwrap().set_audio_link(7, 99.0);

        let rebuilt = SceneLinker::rebuild(&store, &mut doc.scenes);
        assert!(!doc.scenes[0].is_audio_linked);
        assert!(rebuilt.linked_scenes(&doc.scenes).is_empty());
    }

    #[test]
    fn test_listings_ordering() {
        let (mut store, mut doc, mut linker) = fixture();
        let b = doc.scenes[1].id;
        linker.unlink_scene(&mut doc.scenes, b);

        // Move A's marker after C's so the linked ordering flips.
        let a_marker = linker.marker_for_scene(doc.scenes[0].id).unwrap();
        let index = store.index_of(a_marker).unwrap();
        store.begin_drag(index).unwrap();
        store.drag_to(25.0).unwrap();
        store.commit_drag().unwrap();
        linker.resync(&store, &mut doc.scenes);

        let linked = linker.linked_scenes(&doc.scenes);
        assert_eq!(linked.len(), 2);
        assert_eq!(linked[0].title, "C");
        assert_eq!(linked[1].title, "A");

        let unlinked = linker.unlinked_scenes(&doc.scenes);
        assert_eq!(unlinked.len(), 1);
        assert_eq!(unlinked[0].title, "B");
    }
}
