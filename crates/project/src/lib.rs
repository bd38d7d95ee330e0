use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| std::env::temp_dir());
    base.join("storyboard_studio")
}

#[derive(Debug, Error)]
pub enum DocError {
    #[error("scene not found: {0}")]
    SceneNotFound(SceneId),
    #[error("scene index out of range: {0}")]
    IndexOutOfRange(usize),
}

/// Stable scene identity; never reused, survives reordering and persistence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SceneId(pub Uuid);

impl SceneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which media a scene prefers to show when both an image and a video exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl Default for MediaType {
    fn default() -> Self {
        Self::Image
    }
}

impl MediaType {
    pub fn display_name(self) -> &'static str {
        match self {
            MediaType::Image => "Image",
            MediaType::Video => "Video",
        }
    }
}

/// One storyboard scene. The audio link fields are a derived view over the
/// runtime marker store: `audio_marker_index` is positional in the ascending
/// marker list and is rewritten after every marker mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: SceneId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub is_audio_linked: bool,
    #[serde(default)]
    pub audio_marker_index: Option<usize>,
    #[serde(default)]
    pub audio_marker_time: Option<f64>,
    #[serde(default)]
    pub preferred_media_type: MediaType,
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    #[serde(default)]
    pub video_path: Option<PathBuf>,
}

impl Scene {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: SceneId::new(),
            title: title.into(),
            prompt: String::new(),
            translation: String::new(),
            is_audio_linked: false,
            audio_marker_index: None,
            audio_marker_time: None,
            preferred_media_type: MediaType::default(),
            image_path: None,
            video_path: None,
        }
    }

    pub fn set_audio_link(&mut self, marker_index: usize, marker_time: f64) {
        self.is_audio_linked = true;
        self.audio_marker_index = Some(marker_index);
        self.audio_marker_time = Some(marker_time);
    }

    /// Clears the link fields only; the scene itself always survives marker
    /// operations.
    pub fn clear_audio_link(&mut self) {
        self.is_audio_linked = false;
        self.audio_marker_index = None;
        self.audio_marker_time = None;
    }

    pub fn media_path(&self, media: MediaType) -> Option<&Path> {
        match media {
            MediaType::Image => self.image_path.as_deref(),
            MediaType::Video => self.video_path.as_deref(),
        }
    }
}

/// Persisted audio timeline state, embedded in the project document.
/// `markers` is kept ascending by every mutation path in the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTimeline {
    pub audio_file_name: String,
    pub audio_duration: f64,
    #[serde(default)]
    pub markers: Vec<f64>,
    #[serde(default)]
    pub has_audio_timeline: bool,
}

impl AudioTimeline {
    pub fn new(file_name: impl Into<String>, duration: f64) -> Self {
        Self {
            audio_file_name: file_name.into(),
            audio_duration: duration,
            markers: Vec::new(),
            has_audio_timeline: true,
        }
    }
}

/// The storyboard document: ordered scenes plus the optional audio timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryboardDoc {
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub audio_timeline: Option<AudioTimeline>,
}

impl StoryboardDoc {
    pub fn scene_index(&self, id: SceneId) -> Option<usize> {
        self.scenes.iter().position(|s| s.id == id)
    }

    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn scene_mut(&mut self, id: SceneId) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.id == id)
    }

    pub fn add_scene(&mut self, title: impl Into<String>) -> SceneId {
        let scene = Scene::new(title);
        let id = scene.id;
        self.scenes.push(scene);
        id
    }

    /// Copies text and media of a scene under a fresh id. The audio link is
    /// not copied: at most one scene may reference a marker.
    pub fn duplicate_scene(&mut self, id: SceneId) -> Result<SceneId, DocError> {
        let index = self.scene_index(id).ok_or(DocError::SceneNotFound(id))?;
        let mut copy = self.scenes[index].clone();
        copy.id = SceneId::new();
        copy.clear_audio_link();
        let new_id = copy.id;
        self.scenes.insert(index + 1, copy);
        Ok(new_id)
    }

    pub fn remove_scene(&mut self, id: SceneId) -> Result<Scene, DocError> {
        let index = self.scene_index(id).ok_or(DocError::SceneNotFound(id))?;
        Ok(self.scenes.remove(index))
    }

    /// Card drag-and-drop reorder; audio link fields travel with the scene.
    pub fn move_scene(&mut self, from: usize, to: usize) -> Result<(), DocError> {
        if from >= self.scenes.len() {
            return Err(DocError::IndexOutOfRange(from));
        }
        if to >= self.scenes.len() {
            return Err(DocError::IndexOutOfRange(to));
        }
        let scene = self.scenes.remove(from);
        self.scenes.insert(to, scene);
        Ok(())
    }

    /// Replacing or clearing the audio file discards markers and all scene
    /// links; scenes themselves are untouched.
    pub fn drop_audio_timeline(&mut self) {
        self.audio_timeline = None;
        for scene in &mut self.scenes {
            scene.clear_audio_link();
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

pub struct ProjectStore {
    conn: Connection,
    path: PathBuf,
}

impl ProjectStore {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        // Recommended PRAGMAs for local interactive app DB
        conn.pragma_update(None, "journal_mode", &"WAL")?;
        conn.pragma_update(None, "synchronous", &"NORMAL")?;
        conn.pragma_update(None, "foreign_keys", &"ON")?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open_or_create(&app_data_dir().join("projects.db"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create_project(&self, name: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        let doc = StoryboardDoc::default();
        self.conn.execute(
            "INSERT INTO projects(id, name, document_json, created_at, updated_at) VALUES(?1, ?2, ?3, ?4, ?4)",
            params![id, name, serde_json::to_string(&doc)?, now],
        )?;
        Ok(id)
    }

    pub fn rename_project(&self, id: &str, name: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let changed = self.conn.execute(
            "UPDATE projects SET name = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, name, now],
        )?;
        if changed == 0 {
            return Err(anyhow!("project not found: {id}"));
        }
        Ok(())
    }

    pub fn duplicate_project(&self, id: &str, new_name: &str) -> Result<String> {
        let doc_json: String = self
            .conn
            .query_row(
                "SELECT document_json FROM projects WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .with_context(|| format!("load project {id} for duplication"))?;
        let new_id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        self.conn.execute(
            "INSERT INTO projects(id, name, document_json, created_at, updated_at) VALUES(?1, ?2, ?3, ?4, ?4)",
            params![new_id, new_name, doc_json, now],
        )?;
        Ok(new_id)
    }

    pub fn delete_project(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn list_projects(&self) -> Result<Vec<ProjectRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, created_at, updated_at FROM projects ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ProjectRow {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn load_document(&self, id: &str) -> Result<StoryboardDoc> {
        let raw: String = self
            .conn
            .query_row(
                "SELECT document_json FROM projects WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .with_context(|| format!("project not found: {id}"))?;
        let doc =
            serde_json::from_str(&raw).with_context(|| format!("parse document for project {id}"))?;
        Ok(doc)
    }

    pub fn save_document(&self, id: &str, doc: &StoryboardDoc) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let changed = self.conn.execute(
            "UPDATE projects SET document_json = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, serde_json::to_string(doc)?, now],
        )?;
        if changed == 0 {
            return Err(anyhow!("project not found: {id}"));
        }
        Ok(())
    }
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations(
            name TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
         );
         CREATE TABLE IF NOT EXISTS projects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            document_json TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
         );",
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
        params!["V0001__projects"],
    )?;
    Ok(())
}
