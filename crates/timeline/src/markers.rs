use crate::{Seconds, TimelineError};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Pointer tolerance for grabbing a marker on the waveform, in pixels.
pub const HIT_TOLERANCE_PX: f32 = 10.0;

/// Tolerance for treating the first marker as sitting at the track start.
pub const START_MARKER_TOLERANCE: Seconds = 0.1;

/// Stable marker identity. Survives every re-sort; positional indices are a
/// derived view computed from the ascending time order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MarkerId(pub Uuid);

impl MarkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MarkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cut point on the audio track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub time: Seconds,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    id: MarkerId,
    original_time: Seconds,
}

/// Outcome of committing a marker drag: the marker's index may have changed
/// because the list is re-sorted on release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragOutcome {
    pub id: MarkerId,
    pub new_index: usize,
    /// False when the marker was released at its original time; callers can
    /// skip reindex notifications in that case.
    pub changed: bool,
}

/// Ordered list of cut points on the audio track.
///
/// Invariant: `markers` is ascending by time at every public return point
/// except in the middle of a drag session, where the dragged marker is
/// mutated in place so it does not jump under the pointer. `commit_drag`
/// restores the invariant and reports the marker's new index.
#[derive(Debug, Clone, Default)]
pub struct MarkerStore {
    duration: Seconds,
    markers: Vec<Marker>,
    drag: Option<DragState>,
}

impl MarkerStore {
    pub fn new(duration: Seconds) -> Self {
        Self {
            duration: duration.max(0.0),
            markers: Vec::new(),
            drag: None,
        }
    }

    /// Rebuilds the store from persisted marker times.
    pub fn from_times(duration: Seconds, times: &[Seconds]) -> Self {
        let mut store = Self::new(duration);
        for &t in times {
            store.add_marker(t);
        }
        store
    }

    pub fn duration(&self) -> Seconds {
        self.duration
    }

    pub fn set_duration(&mut self, duration: Seconds) {
        self.duration = duration.max(0.0);
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Snapshot of marker times in list order (ascending outside a drag).
    pub fn times(&self) -> Vec<Seconds> {
        self.markers.iter().map(|m| m.time).collect()
    }

    pub fn get(&self, index: usize) -> Option<Marker> {
        self.markers.get(index).copied()
    }

    pub fn id_at(&self, index: usize) -> Option<MarkerId> {
        self.markers.get(index).map(|m| m.id)
    }

    pub fn index_of(&self, id: MarkerId) -> Option<usize> {
        self.markers.iter().position(|m| m.id == id)
    }

    pub fn time_of(&self, id: MarkerId) -> Option<Seconds> {
        self.markers.iter().find(|m| m.id == id).map(|m| m.time)
    }

    /// True when the first marker sits at the start of the track (within
    /// `START_MARKER_TOLERANCE`).
    pub fn starts_at_origin(&self) -> bool {
        self.markers
            .first()
            .map(|m| m.time <= START_MARKER_TOLERANCE)
            .unwrap_or(false)
    }

    /// Inserts a marker clamped to `[0, duration]`, keeping ascending order.
    /// Equal times keep insertion order (stable), so duplicates are tolerated.
    pub fn add_marker(&mut self, time: Seconds) -> MarkerId {
        let time = self.clamp(time);
        let marker = Marker {
            id: MarkerId::new(),
            time,
        };
        let at = self.markers.partition_point(|m| m.time <= time);
        self.markers.insert(at, marker);
        debug!(time, index = at, "marker added");
        marker.id
    }

    pub fn remove_marker(&mut self, id: MarkerId) -> Result<Marker, TimelineError> {
        if self.drag.is_some() {
            return Err(TimelineError::DragInProgress);
        }
        let index = self.index_of(id).ok_or(TimelineError::MarkerNotFound(id))?;
        Ok(self.markers.remove(index))
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Marker, TimelineError> {
        if self.drag.is_some() {
            return Err(TimelineError::DragInProgress);
        }
        if index >= self.markers.len() {
            return Err(TimelineError::IndexOutOfRange(index));
        }
        Ok(self.markers.remove(index))
    }

    /// Applies a parsed text edit to a marker's time and re-sorts, returning
    /// the marker's new index. Rejected parses never reach this point, so
    /// there is no partial apply.
    pub fn set_time(&mut self, id: MarkerId, time: Seconds) -> Result<usize, TimelineError> {
        if self.drag.is_some() {
            return Err(TimelineError::DragInProgress);
        }
        let index = self.index_of(id).ok_or(TimelineError::MarkerNotFound(id))?;
        self.markers[index].time = self.clamp(time);
        self.sort();
        Ok(self.index_of(id).unwrap_or(index))
    }

    /// Begins a drag session on the marker at `index`. During the session
    /// the marker keeps its list position so it stays visually stable.
    pub fn begin_drag(&mut self, index: usize) -> Result<MarkerId, TimelineError> {
        if self.drag.is_some() {
            return Err(TimelineError::DragInProgress);
        }
        let marker = self
            .markers
            .get(index)
            .copied()
            .ok_or(TimelineError::IndexOutOfRange(index))?;
        self.drag = Some(DragState {
            id: marker.id,
            original_time: marker.time,
        });
        Ok(marker.id)
    }

    /// Mutates the dragged marker's time in place, clamped, without sorting.
    pub fn drag_to(&mut self, time: Seconds) -> Result<(), TimelineError> {
        let drag = self.drag.ok_or(TimelineError::NoDragSession)?;
        let time = self.clamp(time);
        if let Some(index) = self.index_of(drag.id) {
            self.markers[index].time = time;
        }
        Ok(())
    }

    /// Ends the drag: re-sorts and recomputes the marker's index by identity.
    pub fn commit_drag(&mut self) -> Result<DragOutcome, TimelineError> {
        let drag = self.drag.take().ok_or(TimelineError::NoDragSession)?;
        self.sort();
        let new_index = self
            .index_of(drag.id)
            .ok_or(TimelineError::MarkerNotFound(drag.id))?;
        let changed = (self.markers[new_index].time - drag.original_time).abs() > f64::EPSILON;
        debug!(
            marker = %drag.id,
            new_index,
            changed,
            "drag committed"
        );
        Ok(DragOutcome {
            id: drag.id,
            new_index,
            changed,
        })
    }

    /// Aborts the drag and restores the marker's original time. Cancelled
    /// drags leave the store exactly as it was.
    pub fn cancel_drag(&mut self) -> Result<(), TimelineError> {
        let drag = self.drag.take().ok_or(TimelineError::NoDragSession)?;
        if let Some(index) = self.index_of(drag.id) {
            self.markers[index].time = drag.original_time;
        }
        self.sort();
        Ok(())
    }

    pub fn drag_in_progress(&self) -> bool {
        self.drag.is_some()
    }

    /// Discrete list reorder (marker panel drag, not waveform drag). The
    /// list is time-ordered, so the splice is immediately re-sorted; this
    /// exists so panel drops behave like the waveform path.
    pub fn reorder_markers(&mut self, dragged: usize, drop: usize) -> Result<(), TimelineError> {
        if self.drag.is_some() {
            return Err(TimelineError::DragInProgress);
        }
        if dragged >= self.markers.len() {
            return Err(TimelineError::IndexOutOfRange(dragged));
        }
        if drop >= self.markers.len() {
            return Err(TimelineError::IndexOutOfRange(drop));
        }
        let marker = self.markers.remove(dragged);
        self.markers.insert(drop, marker);
        self.sort();
        Ok(())
    }

    /// Maps a marker index to its x position on a canvas of `canvas_width`.
    pub fn marker_x(&self, index: usize, canvas_width: f32) -> Option<f32> {
        if self.duration <= 0.0 {
            return None;
        }
        self.markers
            .get(index)
            .map(|m| (m.time / self.duration) as f32 * canvas_width)
    }

    /// Maps a pointer x position back to a timeline time.
    pub fn time_at_x(&self, x: f32, canvas_width: f32) -> Seconds {
        if canvas_width <= 0.0 {
            return 0.0;
        }
        self.clamp((x / canvas_width) as Seconds * self.duration)
    }

    /// Finds the marker under the pointer, if any: nearest marker whose
    /// rendered x position is within `HIT_TOLERANCE_PX` of `pointer_x`.
    pub fn hit_test(&self, pointer_x: f32, canvas_width: f32) -> Option<usize> {
        if self.duration <= 0.0 || canvas_width <= 0.0 {
            return None;
        }
        let mut best: Option<(usize, f32)> = None;
        for (index, marker) in self.markers.iter().enumerate() {
            let x = (marker.time / self.duration) as f32 * canvas_width;
            let dist = (x - pointer_x).abs();
            if dist <= HIT_TOLERANCE_PX {
                match best {
                    Some((_, d)) if d <= dist => {}
                    _ => best = Some((index, dist)),
                }
            }
        }
        best.map(|(index, _)| index)
    }

    fn clamp(&self, time: Seconds) -> Seconds {
        if self.duration > 0.0 {
            time.clamp(0.0, self.duration)
        } else {
            time.max(0.0)
        }
    }

    fn sort(&mut self) {
        // Stable: equal-time markers keep their relative order.
        self.markers.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    #[cfg(test)]
    fn is_sorted(&self) -> bool {
        self.markers.windows(2).all(|w| w[0].time <= w[1].time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keeps_ascending_and_clamps() {
        let mut store = MarkerStore::new(10.0);
        store.add_marker(5.0);
        store.add_marker(-3.0);
        store.add_marker(25.0);
        store.add_marker(2.5);
        assert_eq!(store.times(), vec![0.0, 2.5, 5.0, 10.0]);
        assert!(store.is_sorted());
    }

    #[test]
    fn test_ordering_after_mixed_mutations() {
        let mut store = MarkerStore::new(60.0);
        for t in [12.0, 3.0, 45.0, 30.0, 3.0] {
            store.add_marker(t);
        }
        store.remove_at(2).unwrap();

        store.begin_drag(0).unwrap();
        store.drag_to(40.0).unwrap();
        let outcome = store.commit_drag().unwrap();
        assert!(outcome.changed);
        assert!(store.is_sorted());

        store.reorder_markers(3, 0).unwrap();
        assert!(store.is_sorted());
    }

    #[test]
    fn test_drag_identity_survives_resort() {
        let mut store = MarkerStore::new(20.0);
        store.add_marker(2.0);
        let id = store.add_marker(5.0);
        store.add_marker(9.0);

        store.begin_drag(1).unwrap();
        store.drag_to(15.0).unwrap();
        // list is intentionally unsorted mid-drag
        assert_eq!(store.times(), vec![2.0, 15.0, 9.0]);

        let outcome = store.commit_drag().unwrap();
        assert_eq!(outcome.id, id);
        assert_eq!(outcome.new_index, 2);
        assert_eq!(store.times(), vec![2.0, 9.0, 15.0]);
    }

    #[test]
    fn test_idempotent_drag_release_in_place() {
        let mut store = MarkerStore::new(20.0);
        store.add_marker(2.0);
        store.add_marker(5.0);
        let before = store.times();

        store.begin_drag(1).unwrap();
        store.drag_to(5.0).unwrap();
        let outcome = store.commit_drag().unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.new_index, 1);
        assert_eq!(store.times(), before);
    }

    #[test]
    fn test_cancel_drag_restores_store() {
        let mut store = MarkerStore::new(20.0);
        store.add_marker(2.0);
        store.add_marker(5.0);
        let before = store.times();

        store.begin_drag(0).unwrap();
        store.drag_to(18.0).unwrap();
        store.cancel_drag().unwrap();
        assert_eq!(store.times(), before);
        assert!(!store.drag_in_progress());
    }

    #[test]
    fn test_mutations_rejected_mid_drag() {
        let mut store = MarkerStore::new(20.0);
        let id = store.add_marker(2.0);
        store.add_marker(5.0);
        store.begin_drag(0).unwrap();

        assert!(matches!(
            store.remove_marker(id),
            Err(TimelineError::DragInProgress)
        ));
        assert!(matches!(
            store.reorder_markers(0, 1),
            Err(TimelineError::DragInProgress)
        ));
        store.cancel_drag().unwrap();
    }

    #[test]
    fn test_hit_test_tolerance() {
        let mut store = MarkerStore::new(100.0);
        store.add_marker(50.0); // x = 500 on a 1000px canvas

        assert_eq!(store.hit_test(505.0, 1000.0), Some(0));
        assert_eq!(store.hit_test(495.0, 1000.0), Some(0));
        assert_eq!(store.hit_test(515.0, 1000.0), None);
    }

    #[test]
    fn test_hit_test_nearest_wins() {
        let mut store = MarkerStore::new(100.0);
        store.add_marker(50.0); // x = 500
        store.add_marker(51.0); // x = 510

        assert_eq!(store.hit_test(508.0, 1000.0), Some(1));
        assert_eq!(store.hit_test(502.0, 1000.0), Some(0));
    }

    #[test]
    fn test_start_marker_tolerance() {
        let mut store = MarkerStore::new(100.0);
        store.add_marker(0.05);
        assert!(store.starts_at_origin());

        let mut late = MarkerStore::new(100.0);
        late.add_marker(0.5);
        assert!(!late.starts_at_origin());
    }

    #[test]
    fn test_set_time_resorts_and_returns_new_index() {
        let mut store = MarkerStore::new(30.0);
        let id = store.add_marker(5.0);
        store.add_marker(10.0);
        store.add_marker(20.0);

        let new_index = store.set_time(id, 25.0).unwrap();
        assert_eq!(new_index, 2);
        assert_eq!(store.times(), vec![10.0, 20.0, 25.0]);
    }
}
