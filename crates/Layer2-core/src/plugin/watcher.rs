//! Change Watcher - 파일 변경을 애드온 목록에 반영
//!
//! ```text
//! AddonFiles::subscribe ──▶ SelfWriteGuard ──▶ ChangeDebouncer ──▶ reconcile
//!                           (자기 쓰기 무시)     (파일별로 합침)      (잠금 후 적용)
//! ```
//!
//! 파일 읽기는 매니저 잠금 밖에서 끝내고, 반영만 잠금 안에서 합니다.

use bridge_foundation::{Error, Result, WatchConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::files::{AddonFiles, ChangeKind, FileChange};
use super::manager::{PluginManager, Reconcile, SharedManager};

// ============================================================================
// SelfWriteGuard
// ============================================================================

/// 직접 쓴 파일의 알림을 잠시 무시
#[derive(Debug)]
pub struct SelfWriteGuard {
    window: Duration,
    marks: Mutex<HashMap<String, Instant>>,
}

impl SelfWriteGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            marks: Mutex::new(HashMap::new()),
        }
    }

    /// 쓰기 직전에 호출
    pub fn mark(&self, filename: &str) {
        self.marks.lock().insert(filename.to_string(), Instant::now());
    }

    /// 구간 안이면 true (만료된 표시는 정리)
    pub fn should_ignore(&self, filename: &str) -> bool {
        let now = Instant::now();
        let mut marks = self.marks.lock();
        marks.retain(|_, at| now.duration_since(*at) < self.window);
        marks.contains_key(filename)
    }
}

// ============================================================================
// ChangeDebouncer
// ============================================================================

/// 파일별 변경 합치기
///
/// 마지막 알림 후 `window` 가 지나야 내보냅니다.
/// - Created 뒤 Changed → Created
/// - Deleted 뒤 Created → Changed (교체 저장)
/// - 그 외에는 마지막 종류
#[derive(Debug)]
pub struct ChangeDebouncer {
    window: Duration,
    pending: HashMap<String, (ChangeKind, Instant)>,
}

impl ChangeDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub fn push(&mut self, change: FileChange, now: Instant) {
        let deadline = now + self.window;
        let kind = match self.pending.get(&change.filename) {
            Some((ChangeKind::Created, _)) if change.kind == ChangeKind::Changed => ChangeKind::Created,
            Some((ChangeKind::Deleted, _)) if change.kind == ChangeKind::Created => ChangeKind::Changed,
            _ => change.kind,
        };
        self.pending.insert(change.filename, (kind, deadline));
    }

    /// 가장 이른 만료 시각
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(_, deadline)| *deadline).min()
    }

    /// 만료된 변경을 파일 이름순으로 꺼냄
    pub fn drain_ready(&mut self, now: Instant) -> Vec<FileChange> {
        let mut ready: Vec<FileChange> = self
            .pending
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(filename, (kind, _))| FileChange::new(filename.clone(), *kind))
            .collect();
        for change in &ready {
            self.pending.remove(&change.filename);
        }
        ready.sort_by(|a, b| a.filename.cmp(&b.filename));
        ready
    }

    /// 남은 변경 전부
    pub fn drain_all(&mut self) -> Vec<FileChange> {
        let mut all: Vec<FileChange> = self
            .pending
            .drain()
            .map(|(filename, (kind, _))| FileChange::new(filename, kind))
            .collect();
        all.sort_by(|a, b| a.filename.cmp(&b.filename));
        all
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ============================================================================
// watch_changes
// ============================================================================

/// 변경 하나를 목록에 반영
pub async fn reconcile(shared: &SharedManager, files: &Arc<dyn AddonFiles>, change: FileChange) {
    let request = match change.kind {
        ChangeKind::Deleted => Reconcile::Removed(change.filename),
        ChangeKind::Created | ChangeKind::Changed => match files.read(&change.filename).await {
            Ok(file) => Reconcile::Written(file),
            Err(Error::NotFound(_)) => Reconcile::Removed(change.filename),
            Err(e) => {
                warn!("Could not read {}: {}", change.filename, e);
                return;
            }
        },
    };

    if let Err(e) = shared.lock().apply_change(request) {
        warn!("Failed to reconcile file change: {}", e);
    }
}

/// 감시 루프 시작
pub fn watch_changes(shared: SharedManager, config: &WatchConfig) -> Result<JoinHandle<()>> {
    let (files, guard) = {
        let manager = shared.lock();
        (Arc::clone(manager.files()), manager.self_writes())
    };
    let mut rx = files.subscribe()?;
    let mut debouncer = ChangeDebouncer::new(config.debounce());

    info!("Watching {} for plugin changes", files.folder().display());

    Ok(tokio::spawn(async move {
        loop {
            let deadline = debouncer.next_deadline();
            let wait = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                change = rx.recv() => match change {
                    Some(change) => {
                        if guard.should_ignore(&change.filename) {
                            debug!("Ignoring self-inflicted change to {}", change.filename);
                            continue;
                        }
                        debouncer.push(change, Instant::now());
                    }
                    None => {
                        for change in debouncer.drain_all() {
                            reconcile(&shared, &files, change).await;
                        }
                        debug!("File change stream closed");
                        break;
                    }
                },
                _ = wait => {
                    for change in debouncer.drain_ready(Instant::now()) {
                        debug!("Reconciling {:?} {}", change.kind, change.filename);
                        reconcile(&shared, &files, change).await;
                    }
                }
            }
        }
    }))
}

/// DOM 변경 배치를 매니저로 전달하는 태스크
///
/// 수신기를 이미 가져갔으면 `None`.
pub fn spawn_mutation_pump(shared: SharedManager) -> Option<JoinHandle<()>> {
    let mut rx = shared.lock().mutation_hub().take_receiver()?;
    Some(tokio::spawn(async move {
        while let Some(batch) = rx.recv().await {
            shared.lock().dispatch_mutations(&batch);
        }
    }))
}

/// 실행 중인 백그라운드 태스크
pub struct WatchHandles {
    pub changes: JoinHandle<()>,
    pub mutations: Option<JoinHandle<()>>,
}

impl WatchHandles {
    pub fn abort(&self) {
        self.changes.abort();
        if let Some(handle) = &self.mutations {
            handle.abort();
        }
    }
}

/// 시작 시퀀스: 로드 → 감시 시작 → 준비 신호
pub async fn bootstrap(shared: &SharedManager, config: &WatchConfig) -> Result<WatchHandles> {
    let report = PluginManager::initialize(shared).await?;
    info!(
        "Loaded {} plugins ({} skipped), started {} ({} failed)",
        report.loaded, report.skipped, report.started, report.failed
    );

    let changes = watch_changes(Arc::clone(shared), config)?;
    let mutations = spawn_mutation_pump(Arc::clone(shared));
    shared.lock().mark_ready();

    Ok(WatchHandles { changes, mutations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::events::EventKind;
    use crate::plugin::files::{MemoryAddonFiles, PluginFile};
    use crate::plugin::observer::{Mutation, MutationSource};
    use crate::testing::{plugin_source, RecordingNotifier, ScriptedEngine};
    use bridge_foundation::MemoryEnabledStore;
    use tokio::sync::mpsc;

    fn source(name: &str, version: &str) -> String {
        plugin_source(name, version, "start(){} stop(){} observer(m){}")
    }

    fn shared_manager(files: Arc<MemoryAddonFiles>, enabled: &[&str]) -> (SharedManager, Arc<ScriptedEngine>) {
        let engine = Arc::new(ScriptedEngine::default());
        let manager = PluginManager::new(
            engine.clone(),
            files,
            Arc::new(MemoryEnabledStore::with_enabled(enabled.iter().copied())),
            Arc::new(RecordingNotifier::default()),
        );
        (manager.into_shared(), engine)
    }

    fn fast() -> WatchConfig {
        WatchConfig {
            debounce_ms: 30,
            self_write_ignore_ms: 1000,
        }
    }

    #[test]
    fn test_debouncer_collapses_per_file() {
        let mut debouncer = ChangeDebouncer::new(Duration::from_millis(100));
        let t0 = Instant::now();

        debouncer.push(FileChange::new("a.plugin.js", ChangeKind::Changed), t0);
        debouncer.push(FileChange::new("a.plugin.js", ChangeKind::Changed), t0 + Duration::from_millis(50));
        debouncer.push(FileChange::new("b.plugin.js", ChangeKind::Created), t0);
        debouncer.push(FileChange::new("b.plugin.js", ChangeKind::Changed), t0 + Duration::from_millis(10));

        assert_eq!(debouncer.len(), 2);
        assert_eq!(debouncer.next_deadline(), Some(t0 + Duration::from_millis(110)));

        let ready = debouncer.drain_ready(t0 + Duration::from_millis(120));
        assert_eq!(ready, vec![FileChange::new("b.plugin.js", ChangeKind::Created)]);

        let ready = debouncer.drain_ready(t0 + Duration::from_millis(150));
        assert_eq!(ready, vec![FileChange::new("a.plugin.js", ChangeKind::Changed)]);
        assert!(debouncer.is_empty());
    }

    #[test]
    fn test_debouncer_replace_save() {
        let mut debouncer = ChangeDebouncer::new(Duration::from_millis(10));
        let t0 = Instant::now();
        debouncer.push(FileChange::new("a.plugin.js", ChangeKind::Deleted), t0);
        debouncer.push(FileChange::new("a.plugin.js", ChangeKind::Created), t0);
        assert_eq!(
            debouncer.drain_all(),
            vec![FileChange::new("a.plugin.js", ChangeKind::Changed)]
        );
    }

    #[test]
    fn test_self_write_guard_window() {
        let guard = SelfWriteGuard::new(Duration::from_millis(0));
        guard.mark("a.plugin.js");
        assert!(!guard.should_ignore("a.plugin.js"));

        let guard = SelfWriteGuard::new(Duration::from_secs(60));
        guard.mark("a.plugin.js");
        assert!(guard.should_ignore("a.plugin.js"));
        assert!(!guard.should_ignore("b.plugin.js"));
    }

    #[tokio::test]
    async fn test_rapid_updates_reconcile_once() {
        let files = Arc::new(MemoryAddonFiles::with_files(vec![PluginFile::new(
            "Foo.plugin.js",
            source("Foo", "1.0.0"),
        )]));
        let (shared, engine) = shared_manager(files.clone(), &["Foo"]);
        let handles = bootstrap(&shared, &fast()).await.unwrap();
        assert!(shared.lock().is_ready());

        files.external_write("Foo.plugin.js", &source("Foo", "1.1.0"));
        files.external_write("Foo.plugin.js", &source("Foo", "1.2.0"));
        tokio::time::sleep(Duration::from_millis(200)).await;

        let manager = shared.lock();
        assert_eq!(manager.get("Foo").unwrap().meta().version, "1.2.0");
        assert_eq!(manager.event_bus().history_by_kind(EventKind::Updated).len(), 1);
        assert_eq!(engine.calls(), vec!["Foo.start", "Foo.stop", "Foo.start"]);
        drop(manager);
        handles.abort();
    }

    #[tokio::test]
    async fn test_external_create_and_delete() {
        let files = Arc::new(MemoryAddonFiles::new());
        let (shared, _) = shared_manager(files.clone(), &[]);
        let handles = bootstrap(&shared, &fast()).await.unwrap();

        files.external_write("Bar.plugin.js", &source("Bar", "1.0.0"));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(shared.lock().get("Bar").is_some());

        files.external_delete("Bar.plugin.js");
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(shared.lock().is_empty());
        handles.abort();
    }

    #[tokio::test]
    async fn test_own_writes_do_not_reconcile() {
        let files = Arc::new(MemoryAddonFiles::new());
        let (shared, _) = shared_manager(files.clone(), &[]);
        let handles = bootstrap(&shared, &fast()).await.unwrap();

        shared
            .lock()
            .create_plugin(PluginFile::new("Own.plugin.js", source("Own", "1.0.0")), false, true)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let manager = shared.lock();
        assert_eq!(manager.event_bus().history_by_kind(EventKind::Added).len(), 1);
        assert_eq!(manager.event_bus().history_by_kind(EventKind::Updated).len(), 0);
        drop(manager);
        handles.abort();
    }

    struct ChannelSource {
        sink: Mutex<Option<mpsc::UnboundedSender<Vec<Mutation>>>>,
    }

    impl MutationSource for ChannelSource {
        fn observe(&self, sink: mpsc::UnboundedSender<Vec<Mutation>>) {
            *self.sink.lock() = Some(sink);
        }
    }

    #[tokio::test]
    async fn test_mutation_pump_reaches_observers() {
        let files = Arc::new(MemoryAddonFiles::with_files(vec![PluginFile::new(
            "Foo.plugin.js",
            source("Foo", "1.0.0"),
        )]));
        let engine = Arc::new(ScriptedEngine::default());
        let mutation_source = Arc::new(ChannelSource { sink: Mutex::new(None) });
        let shared = PluginManager::new(
            engine.clone(),
            files,
            Arc::new(MemoryEnabledStore::with_enabled(["Foo"])),
            Arc::new(RecordingNotifier::default()),
        )
        .with_mutation_source(mutation_source.clone())
        .into_shared();

        let handles = bootstrap(&shared, &fast()).await.unwrap();
        let sink = mutation_source.sink.lock().clone().unwrap();
        sink.send(vec![Mutation::child_list("body", vec![], vec![])]).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(engine.calls(), vec!["Foo.start", "Foo.observer"]);
        handles.abort();
    }
}
