//! Addon Files - 플러그인 폴더 접근
//!
//! 파일 하나에 플러그인 하나 (`*.plugin.js`). 매니저는 이 trait 만 사용하며
//! 실제 구현은 로컬 디렉터리(`FsAddonFiles`) 또는 메모리(`MemoryAddonFiles`)입니다.

use async_trait::async_trait;
use bridge_foundation::{Error, Result, PLUGIN_SUFFIX};
use chrono::{DateTime, Utc};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// ============================================================================
// PluginFile / FileChange
// ============================================================================

/// 플러그인 파일 내용과 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFile {
    pub filename: String,
    pub content: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub added: DateTime<Utc>,
}

impl PluginFile {
    /// 현재 시각으로 생성 (메모리 파일/다운로드 결과용)
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let now = Utc::now();
        Self {
            filename: filename.into(),
            size: content.len() as u64,
            content,
            modified: now,
            added: now,
        }
    }

    /// 추가 시각 유지 (업데이트용)
    pub fn with_added(mut self, added: DateTime<Utc>) -> Self {
        self.added = added;
        self
    }
}

/// 파일 변경 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
}

/// 파일 변경 알림
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub filename: String,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn new(filename: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            filename: filename.into(),
            kind,
        }
    }
}

/// 플러그인 파일 이름인지 확인
pub fn is_plugin_file(name: &str) -> bool {
    name.ends_with(PLUGIN_SUFFIX)
}

/// 폴더 밖을 가리키는 이름 거부
fn validate_filename(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::InvalidInput(format!("Invalid plugin filename: {}", name)));
    }
    Ok(())
}

// ============================================================================
// AddonFiles trait
// ============================================================================

/// 플러그인 파일 저장소
#[async_trait]
pub trait AddonFiles: Send + Sync {
    /// 플러그인 폴더 경로
    fn folder(&self) -> &Path;

    /// 모든 플러그인 파일
    async fn list(&self) -> Result<Vec<PluginFile>>;

    /// 파일 하나 읽기
    async fn read(&self, filename: &str) -> Result<PluginFile>;

    /// 파일 쓰기
    fn write(&self, filename: &str, content: &str) -> Result<()>;

    /// 파일 삭제
    fn delete(&self, filename: &str) -> Result<()>;

    /// 변경 알림 구독
    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<FileChange>>;

    /// 파일 탐색기로 폴더 열기
    fn open_folder(&self) -> Result<()>;
}

// ============================================================================
// FsAddonFiles
// ============================================================================

/// 로컬 디렉터리 구현
pub struct FsAddonFiles {
    folder: PathBuf,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FsAddonFiles {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            watcher: Mutex::new(None),
        }
    }

    /// 폴더가 없으면 생성
    pub fn ensure_folder(&self) -> Result<()> {
        if !self.folder.exists() {
            std::fs::create_dir_all(&self.folder)?;
        }
        Ok(())
    }

    fn path_of(&self, filename: &str) -> Result<PathBuf> {
        validate_filename(filename)?;
        Ok(self.folder.join(filename))
    }

    async fn read_path(&self, filename: &str, path: &Path) -> Result<PluginFile> {
        let (content, metadata) =
            tokio::try_join!(tokio::fs::read_to_string(path), tokio::fs::metadata(path))?;

        let modified = metadata.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
        let added = metadata
            .created()
            .or_else(|_| metadata.accessed())
            .map(DateTime::<Utc>::from)
            .unwrap_or(modified);

        Ok(PluginFile {
            filename: filename.to_string(),
            size: metadata.len(),
            content,
            modified,
            added,
        })
    }
}

/// notify 이벤트 → 플러그인 파일 변경
fn classify(event: &notify::Event) -> Vec<FileChange> {
    let names: Vec<String> = event
        .paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .collect();

    let kinds: Vec<ChangeKind> = match &event.kind {
        EventKind::Create(_) => vec![ChangeKind::Created; names.len()],
        EventKind::Remove(_) => vec![ChangeKind::Deleted; names.len()],
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => vec![ChangeKind::Deleted; names.len()],
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => vec![ChangeKind::Created; names.len()],
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            vec![ChangeKind::Deleted, ChangeKind::Created]
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => vec![ChangeKind::Changed; names.len()],
        _ => return Vec::new(),
    };

    names
        .into_iter()
        .zip(kinds)
        .filter(|(name, _)| is_plugin_file(name))
        .map(|(name, kind)| FileChange::new(name, kind))
        .collect()
}

#[async_trait]
impl AddonFiles for FsAddonFiles {
    fn folder(&self) -> &Path {
        &self.folder
    }

    async fn list(&self) -> Result<Vec<PluginFile>> {
        let mut entries = tokio::fs::read_dir(&self.folder).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_plugin_file(&name) && entry.file_type().await?.is_file() {
                names.push(name);
            }
        }
        names.sort();

        let reads = names.iter().map(|name| {
            let path = self.folder.join(name);
            async move { self.read_path(name, &path).await }
        });
        let files = futures::future::try_join_all(reads).await?;

        debug!("Found {} plugin files in {}", files.len(), self.folder.display());
        Ok(files)
    }

    async fn read(&self, filename: &str) -> Result<PluginFile> {
        let path = self.path_of(filename)?;
        self.read_path(filename, &path).await
    }

    /// 임시 파일에 쓴 뒤 rename
    fn write(&self, filename: &str, content: &str) -> Result<()> {
        let path = self.path_of(filename)?;
        let temp = self.folder.join(format!(".{}.{}.tmp", filename, uuid::Uuid::new_v4()));

        std::fs::write(&temp, content)?;
        if let Err(e) = std::fs::rename(&temp, &path) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }

        debug!("Wrote {}", path.display());
        Ok(())
    }

    fn delete(&self, filename: &str) -> Result<()> {
        let path = self.path_of(filename)?;
        std::fs::remove_file(&path)?;
        debug!("Deleted {}", path.display());
        Ok(())
    }

    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<FileChange>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    for change in classify(&event) {
                        let _ = tx.send(change);
                    }
                }
                Err(e) => warn!("Plugin folder watch error: {}", e),
            }
        })
        .map_err(|e| Error::Internal(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&self.folder, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Internal(format!("Failed to watch {}: {}", self.folder.display(), e)))?;

        info!("Watching {}", self.folder.display());
        *self.watcher.lock() = Some(watcher);
        Ok(rx)
    }

    fn open_folder(&self) -> Result<()> {
        let opener = if cfg!(target_os = "windows") {
            "explorer"
        } else if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        };
        Command::new(opener).arg(&self.folder).spawn()?;
        Ok(())
    }
}

// ============================================================================
// MemoryAddonFiles
// ============================================================================

/// 메모리 구현 (테스트/임베딩용)
pub struct MemoryAddonFiles {
    folder: PathBuf,
    files: Mutex<BTreeMap<String, PluginFile>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<FileChange>>>,
}

impl Default for MemoryAddonFiles {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("plugins"),
            files: Mutex::new(BTreeMap::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl MemoryAddonFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// 초기 파일과 함께 생성 (알림 없음)
    pub fn with_files<I>(files: I) -> Self
    where
        I: IntoIterator<Item = PluginFile>,
    {
        let store = Self::new();
        {
            let mut map = store.files.lock();
            for file in files {
                map.insert(file.filename.clone(), file);
            }
        }
        store
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.files.lock().contains_key(filename)
    }

    pub fn content(&self, filename: &str) -> Option<String> {
        self.files.lock().get(filename).map(|f| f.content.clone())
    }

    /// 외부 편집 흉내 - 저장 후 구독자에게 알림
    pub fn external_write(&self, filename: &str, content: &str) {
        let kind = if self.contains(filename) {
            ChangeKind::Changed
        } else {
            ChangeKind::Created
        };
        self.files
            .lock()
            .insert(filename.to_string(), PluginFile::new(filename, content));
        self.emit(FileChange::new(filename, kind));
    }

    /// 외부 삭제 흉내
    pub fn external_delete(&self, filename: &str) {
        if self.files.lock().remove(filename).is_some() {
            self.emit(FileChange::new(filename, ChangeKind::Deleted));
        }
    }

    fn emit(&self, change: FileChange) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(change.clone()).is_ok());
    }
}

#[async_trait]
impl AddonFiles for MemoryAddonFiles {
    fn folder(&self) -> &Path {
        &self.folder
    }

    async fn list(&self) -> Result<Vec<PluginFile>> {
        Ok(self.files.lock().values().cloned().collect())
    }

    async fn read(&self, filename: &str) -> Result<PluginFile> {
        self.files
            .lock()
            .get(filename)
            .cloned()
            .ok_or_else(|| Error::NotFound(filename.to_string()))
    }

    fn write(&self, filename: &str, content: &str) -> Result<()> {
        validate_filename(filename)?;
        let kind = if self.contains(filename) {
            ChangeKind::Changed
        } else {
            ChangeKind::Created
        };
        self.files
            .lock()
            .insert(filename.to_string(), PluginFile::new(filename, content));
        self.emit(FileChange::new(filename, kind));
        Ok(())
    }

    fn delete(&self, filename: &str) -> Result<()> {
        if self.files.lock().remove(filename).is_none() {
            return Err(Error::NotFound(filename.to_string()));
        }
        self.emit(FileChange::new(filename, ChangeKind::Deleted));
        Ok(())
    }

    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<FileChange>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        Ok(rx)
    }

    fn open_folder(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> notify::Event {
        let mut event = notify::Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_classify_filters_suffix() {
        let created = event(
            EventKind::Create(CreateKind::File),
            &["/p/A.plugin.js", "/p/notes.txt"],
        );
        assert_eq!(
            classify(&created),
            vec![FileChange::new("A.plugin.js", ChangeKind::Created)]
        );

        let modified = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/p/A.plugin.js"],
        );
        assert_eq!(classify(&modified)[0].kind, ChangeKind::Changed);

        let removed = event(EventKind::Remove(RemoveKind::File), &["/p/A.plugin.js"]);
        assert_eq!(classify(&removed)[0].kind, ChangeKind::Deleted);
    }

    #[test]
    fn test_classify_rename_both() {
        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/p/Old.plugin.js", "/p/New.plugin.js"],
        );
        assert_eq!(
            classify(&renamed),
            vec![
                FileChange::new("Old.plugin.js", ChangeKind::Deleted),
                FileChange::new("New.plugin.js", ChangeKind::Created),
            ]
        );
    }

    #[test]
    fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let files = FsAddonFiles::new(dir.path());
        assert!(files.write("../escape.plugin.js", "x").is_err());
    }

    #[tokio::test]
    async fn test_fs_list_write_delete() {
        let dir = tempfile::tempdir().unwrap();
        let files = FsAddonFiles::new(dir.path());

        files.write("B.plugin.js", "/** @name B */").unwrap();
        files.write("A.plugin.js", "/** @name A */").unwrap();
        std::fs::write(dir.path().join("readme.md"), "ignored").unwrap();
        // 임시 파일이 남지 않음
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);

        let listed = files.list().await.unwrap();
        let names: Vec<_> = listed.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["A.plugin.js", "B.plugin.js"]);
        assert_eq!(listed[0].size, "/** @name A */".len() as u64);

        files.delete("A.plugin.js").unwrap();
        assert_eq!(files.list().await.unwrap().len(), 1);
        assert!(files.read("A.plugin.js").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_files_notify() {
        let files = MemoryAddonFiles::new();
        let mut rx = files.subscribe().unwrap();

        files.external_write("X.plugin.js", "a");
        files.external_write("X.plugin.js", "b");
        files.external_delete("X.plugin.js");

        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Created);
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Changed);
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Deleted);
    }
}
