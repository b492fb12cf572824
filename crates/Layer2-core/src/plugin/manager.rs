//! Plugin Manager - 플러그인 라이프사이클 관리
//!
//! ## 상태
//!
//! ```text
//! Loaded(인스턴스 없음) ──start──▶ Running ──stop──▶ Loaded(인스턴스 유지)
//!        ▲                                              │
//!        └──────────── update (인스턴스 폐기) ◀──────────┘
//! ```
//!
//! - 모든 라이프사이클 연산은 동기이며 중간에 양보하지 않습니다.
//!   공유할 때는 `SharedManager` (parking_lot Mutex) 로 감싸고, 잠금을
//!   await 너머로 들고 가지 않습니다.
//! - 활성화 여부는 항상 `EnabledStore` 를 조회합니다. 매니저는 bool 을
//!   따로 캐시하지 않습니다.
//! - 플러그인 경계 호출(start, stop, observer, onSwitch, getSettingsPanel)은
//!   각각 격리되어 한 플러그인의 실패가 나머지 순회를 멈추지 않습니다.

use bridge_foundation::{BridgeConfig, EnabledStore, Error, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::events::{AddonEvent, EventBus, EventKind};
use super::files::{AddonFiles, PluginFile};
use super::loader::{methods, EvaluatedExport, PluginInstance, PluginLoader, ScriptEngine};
use super::meta::PluginMeta;
use super::observer::{Mutation, MutationHub, MutationSource};
use super::watcher::SelfWriteGuard;
use crate::host::HostValue;
use crate::toast::{Notifier, Toast, ToastKind};

/// 여러 태스크가 공유하는 매니저
pub type SharedManager = Arc<Mutex<PluginManager>>;

// ============================================================================
// Plugin
// ============================================================================

/// 플러그인 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    /// 메타데이터만 있음 (인스턴스는 있을 수도 없을 수도 있음)
    Loaded,
    Running,
}

/// 로드된 플러그인
pub struct Plugin {
    meta: PluginMeta,
    export: Option<EvaluatedExport>,
    instance: Option<Box<dyn PluginInstance>>,
    running: bool,
}

impl Plugin {
    fn new(meta: PluginMeta) -> Self {
        Self {
            meta,
            export: None,
            instance: None,
            running: false,
        }
    }

    pub fn meta(&self) -> &PluginMeta {
        &self.meta
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn name(&self) -> &str {
        self.meta.display_name()
    }

    pub fn filename(&self) -> &str {
        &self.meta.filename
    }

    pub fn state(&self) -> PluginState {
        if self.running {
            PluginState::Running
        } else {
            PluginState::Loaded
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// 인스턴스가 메서드를 가졌는지 (인스턴스 없으면 false)
    pub fn has_method(&self, name: &str) -> bool {
        self.instance.as_ref().map_or(false, |i| i.has_method(name))
    }

    fn matches(&self, id_or_file: &str) -> bool {
        self.meta.id == id_or_file || self.meta.filename == id_or_file
    }

    /// 인스턴스와 export 폐기 (다음 start 때 다시 평가)
    fn discard(&mut self) {
        self.instance = None;
        self.export = None;
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.meta.id)
            .field("filename", &self.meta.filename)
            .field("has_instance", &self.instance.is_some())
            .field("running", &self.running)
            .finish()
    }
}

/// 플러그인 요약 (목록 출력용)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSummary {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub filename: String,
    pub enabled: bool,
    pub state: PluginState,
    pub has_settings_panel: bool,
}

/// 시작 시 일괄 로드 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// 목록에 들어간 플러그인
    pub loaded: usize,
    /// 헤더가 없거나 중복이라 제외된 파일
    pub skipped: usize,
    pub started: usize,
    pub failed: usize,
}

/// 매니저 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub total: usize,
    pub enabled: usize,
    pub running: usize,
}

/// 수동 리로드 시 인스턴스 처리
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadMode {
    /// 기존 인스턴스로 stop → start
    #[default]
    Reuse,
    /// 인스턴스를 버리고 소스부터 다시 평가
    Discard,
}

/// 파일 변경을 목록에 반영하는 요청
#[derive(Debug, Clone)]
pub enum Reconcile {
    /// 파일이 사라짐
    Removed(String),
    /// 파일이 생기거나 바뀜 (목록에 있으면 update, 없으면 create)
    Written(PluginFile),
}

// ============================================================================
// PluginManagerConfig
// ============================================================================

/// 플러그인 매니저 설정
#[derive(Debug, Clone)]
pub struct PluginManagerConfig {
    /// 토스트 표시 시간
    pub toast_timeout: Duration,

    /// 직접 쓴 파일의 변경 알림을 무시하는 시간
    pub self_write_ignore: Duration,
}

impl Default for PluginManagerConfig {
    fn default() -> Self {
        Self::from_bridge(&BridgeConfig::default())
    }
}

impl PluginManagerConfig {
    pub fn from_bridge(config: &BridgeConfig) -> Self {
        Self {
            toast_timeout: config.toast_timeout(),
            self_write_ignore: config.watch.self_write_ignore(),
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "plugin"
    } else {
        "plugins"
    }
}

// ============================================================================
// PluginManager
// ============================================================================

/// 플러그인 매니저 - 애드온 목록과 라이프사이클
pub struct PluginManager {
    /// 표시 이름순으로 정렬된 목록
    plugins: Vec<Plugin>,

    loader: PluginLoader,

    /// 활성화 여부의 유일한 출처
    enabled: Arc<dyn EnabledStore>,

    files: Arc<dyn AddonFiles>,

    notifier: Arc<dyn Notifier>,

    /// 이벤트 버스
    events: Arc<EventBus>,

    observer: MutationHub,

    self_writes: Arc<SelfWriteGuard>,

    ready: watch::Sender<bool>,

    config: PluginManagerConfig,
}

impl PluginManager {
    /// 새 매니저 생성
    pub fn new(
        engine: Arc<dyn ScriptEngine>,
        files: Arc<dyn AddonFiles>,
        enabled: Arc<dyn EnabledStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_config(engine, files, enabled, notifier, PluginManagerConfig::default())
    }

    /// 설정으로 생성
    pub fn with_config(
        engine: Arc<dyn ScriptEngine>,
        files: Arc<dyn AddonFiles>,
        enabled: Arc<dyn EnabledStore>,
        notifier: Arc<dyn Notifier>,
        config: PluginManagerConfig,
    ) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            plugins: Vec::new(),
            loader: PluginLoader::new(engine, files.folder()),
            enabled,
            files,
            notifier,
            events: Arc::new(EventBus::new()),
            observer: MutationHub::new(),
            self_writes: Arc::new(SelfWriteGuard::new(config.self_write_ignore)),
            ready,
            config,
        }
    }

    /// DOM 변경 공급원 연결
    pub fn with_mutation_source(mut self, source: Arc<dyn MutationSource>) -> Self {
        self.observer = MutationHub::new().with_source(source);
        self
    }

    /// 기존 이벤트 버스 공유
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn into_shared(self) -> SharedManager {
        Arc::new(Mutex::new(self))
    }

    // ========================================================================
    // 접근자
    // ========================================================================

    /// 플러그인 폴더
    pub fn folder(&self) -> &std::path::Path {
        self.files.folder()
    }

    pub fn files(&self) -> &Arc<dyn AddonFiles> {
        &self.files
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// 이벤트 버스 접근
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn self_writes(&self) -> Arc<SelfWriteGuard> {
        Arc::clone(&self.self_writes)
    }

    pub fn mutation_hub(&mut self) -> &mut MutationHub {
        &mut self.observer
    }

    /// 정렬된 애드온 목록
    pub fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }

    /// id 또는 파일 이름으로 찾기
    pub fn get(&self, id_or_file: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.matches(id_or_file))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// 활성화 여부 (목록에 없으면 false)
    pub fn is_enabled(&self, id_or_file: &str) -> bool {
        self.get(id_or_file)
            .map_or(false, |p| self.enabled.is_enabled(&p.meta.id))
    }

    pub fn summary(&self, id_or_file: &str) -> Option<PluginSummary> {
        self.get(id_or_file).map(|p| self.summarize(p))
    }

    pub fn summaries(&self) -> Vec<PluginSummary> {
        self.plugins.iter().map(|p| self.summarize(p)).collect()
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            total: self.plugins.len(),
            enabled: self
                .plugins
                .iter()
                .filter(|p| self.enabled.is_enabled(&p.meta.id))
                .count(),
            running: self.plugins.iter().filter(|p| p.running).count(),
        }
    }

    fn summarize(&self, plugin: &Plugin) -> PluginSummary {
        PluginSummary {
            id: plugin.meta.id.clone(),
            name: plugin.name().to_string(),
            version: plugin.meta.version.clone(),
            author: plugin.meta.author.clone(),
            description: plugin.meta.description.clone(),
            filename: plugin.meta.filename.clone(),
            enabled: self.enabled.is_enabled(&plugin.meta.id),
            state: plugin.state(),
            has_settings_panel: plugin.has_method(methods::GET_SETTINGS_PANEL),
        }
    }

    // ========================================================================
    // 준비 신호
    // ========================================================================

    /// 초기 로드가 끝났는지 기다리는 수신기
    pub fn ready_signal(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
        info!("Plugin manager ready with {} {}", self.plugins.len(), plural(self.plugins.len()));
    }

    // ========================================================================
    // 내부 헬퍼
    // ========================================================================

    fn position(&self, id_or_file: &str) -> Option<usize> {
        self.plugins.iter().position(|p| p.matches(id_or_file))
    }

    fn require(&self, id_or_file: &str) -> Result<usize> {
        self.position(id_or_file)
            .ok_or_else(|| Error::NotFound(format!("Plugin {} not found", id_or_file)))
    }

    fn sort(&mut self) {
        self.plugins
            .sort_by_cached_key(|p| p.meta.display_name().to_lowercase());
    }

    fn report(&self, kind: ToastKind, message: String) {
        self.notifier
            .toast(Toast::new(kind, message).with_timeout(self.config.toast_timeout));
    }

    fn publish(&self, kind: EventKind, id: &str) {
        self.events.publish(AddonEvent::new(kind, id));
    }

    fn label(&self, idx: usize) -> String {
        let meta = &self.plugins[idx].meta;
        format!("{} v{}", meta.display_name(), meta.version)
    }

    /// 파일 쓰기 (감시자가 자기 쓰기를 무시하도록 표시)
    fn write_file(&self, filename: &str, content: &str) -> Result<()> {
        self.self_writes.mark(filename);
        self.files.write(filename, content)
    }

    // ========================================================================
    // initPlugin
    // ========================================================================

    /// 파일에서 플러그인 생성 (코드는 실행하지 않음)
    ///
    /// 헤더가 없으면 에러를 보고하고 `MissingHeader` 를 반환합니다.
    pub fn init_plugin(&self, file: &PluginFile) -> Result<Plugin> {
        match PluginMeta::from_file(file) {
            Ok(meta) => Ok(Plugin::new(meta)),
            Err(e) => {
                error!("Failed to load {}: {}", file.filename, e);
                self.report(ToastKind::Error, format!("{} could not be loaded: {}", file.filename, e));
                Err(e)
            }
        }
    }

    // ========================================================================
    // start / stop
    // ========================================================================

    /// 필요하면 평가하고 인스턴스 생성
    fn ensure_instance(loader: &PluginLoader, plugin: &mut Plugin) -> Result<()> {
        if plugin.instance.is_some() {
            return Ok(());
        }

        let export = match &plugin.export {
            Some(export) => export.clone(),
            None => {
                let export = loader.evaluate(&plugin.meta)?;
                plugin.export = Some(export.clone());
                export
            }
        };

        plugin.instance = Some(loader.instantiate(&plugin.meta, &export)?);
        Ok(())
    }

    fn start_at(&mut self, idx: usize, quiet: bool) -> Result<()> {
        if self.plugins[idx].running {
            return Ok(());
        }

        let began = Instant::now();
        let name = self.plugins[idx].name().to_string();

        if let Err(e) = Self::ensure_instance(&self.loader, &mut self.plugins[idx]) {
            error!("Failed to load {}: {}", name, e);
            if !quiet {
                self.report(ToastKind::Error, format!("{} could not be started: {}", name, e));
            }
            return Err(e);
        }

        let plugin = &mut self.plugins[idx];
        let outcome = match plugin.instance.as_mut() {
            Some(instance) => instance.call(methods::START, &[]),
            None => Ok(HostValue::Undefined),
        };

        if let Err(e) = outcome {
            plugin.instance = None;
            let err = Error::runtime(&name, e.message);
            error!("Failed to start {}: {}", name, err);
            if let Some(stack) = e.stack {
                debug!("{}", stack);
            }
            if !quiet {
                self.report(ToastKind::Error, format!("{} could not be started: {}", name, err));
            }
            return Err(err);
        }

        plugin.running = true;
        info!("Started {} in {:.2}ms", name, began.elapsed().as_secs_f64() * 1000.0);

        let id = plugin.meta.id.clone();
        if plugin.has_method(methods::OBSERVER) {
            self.observer.ensure_started();
        }
        if !quiet {
            self.report(ToastKind::Success, format!("{} has started.", self.label(idx)));
        }
        self.publish(EventKind::Started, &id);
        Ok(())
    }

    fn stop_at(&mut self, idx: usize, quiet: bool) -> Result<()> {
        let plugin = &mut self.plugins[idx];
        if !plugin.running {
            return Ok(());
        }
        plugin.running = false;

        let name = plugin.name().to_string();
        let id = plugin.meta.id.clone();
        let outcome = match plugin.instance.as_mut() {
            Some(instance) => instance.call(methods::STOP, &[]).map(|_| ()),
            None => Ok(()),
        };
        self.publish(EventKind::Stopped, &id);

        match outcome {
            Ok(()) => {
                info!("Stopped {}", name);
                if !quiet {
                    self.report(ToastKind::Success, format!("{} has stopped.", self.label(idx)));
                }
                Ok(())
            }
            Err(e) => {
                let err = Error::runtime(&name, e.message);
                error!("Failed to stop {}: {}", name, err);
                if !quiet {
                    self.report(ToastKind::Error, format!("{} could not be stopped: {}", name, err));
                }
                Err(err)
            }
        }
    }

    /// 플러그인 시작 (EnabledSet 은 바꾸지 않음)
    pub fn start_plugin(&mut self, id_or_file: &str) -> Result<()> {
        let idx = self.require(id_or_file)?;
        self.start_at(idx, false)
    }

    /// 플러그인 정지 (인스턴스는 유지)
    pub fn stop_plugin(&mut self, id_or_file: &str) -> Result<()> {
        let idx = self.require(id_or_file)?;
        self.stop_at(idx, false)
    }

    // ========================================================================
    // enable / disable / toggle / reload
    // ========================================================================

    /// 활성화 - 시작에 성공했을 때만 플래그를 켭니다
    pub fn enable(&mut self, id_or_file: &str) -> Result<()> {
        let idx = self.require(id_or_file)?;
        let id = self.plugins[idx].meta.id.clone();

        if self.enabled.is_enabled(&id) && self.plugins[idx].running {
            return Ok(());
        }

        self.start_at(idx, false)?;

        if let Err(e) = self.enabled.set_enabled(&id, true) {
            warn!("Could not persist enabled flag for {}: {}", id, e);
            let _ = self.stop_at(idx, true);
            return Err(e);
        }

        self.publish(EventKind::Enabled, &id);
        Ok(())
    }

    /// 비활성화 - 정지는 최선을 다하고 플래그는 항상 끕니다
    pub fn disable(&mut self, id_or_file: &str) -> Result<()> {
        let idx = self.require(id_or_file)?;
        let id = self.plugins[idx].meta.id.clone();

        if self.plugins[idx].running {
            // 실패는 이미 보고됨
            let _ = self.stop_at(idx, false);
        } else {
            self.report(ToastKind::Info, format!("{} has been disabled.", self.label(idx)));
        }

        self.enabled.set_enabled(&id, false)?;
        self.publish(EventKind::Disabled, &id);
        Ok(())
    }

    /// 플래그 기준으로 enable/disable
    pub fn toggle(&mut self, id_or_file: &str) -> Result<()> {
        if self.is_enabled(id_or_file) {
            self.disable(id_or_file)
        } else {
            self.enable(id_or_file)
        }
    }

    /// 활성화된 플러그인만 stop → start
    pub fn reload(&mut self, id_or_file: &str, mode: ReloadMode) -> Result<()> {
        let idx = self.require(id_or_file)?;
        if !self.enabled.is_enabled(&self.plugins[idx].meta.id) {
            debug!("{} is not enabled, skipping reload", id_or_file);
            return Ok(());
        }

        let _ = self.stop_at(idx, true);
        if mode == ReloadMode::Discard {
            self.plugins[idx].discard();
        }

        match self.start_at(idx, true) {
            Ok(()) => {
                self.report(ToastKind::Success, format!("{} was reloaded.", self.label(idx)));
                Ok(())
            }
            Err(e) => {
                self.report(
                    ToastKind::Error,
                    format!("{} could not be reloaded: {}", self.plugins[idx].name(), e),
                );
                Err(e)
            }
        }
    }

    // ========================================================================
    // create / update / delete
    // ========================================================================

    /// 새 플러그인 추가
    ///
    /// 이미 활성화된 id 면 시작하고, `enable` 이면 활성화 경로를 타고,
    /// 아니면 추가만 알립니다.
    pub fn create_plugin(&mut self, file: PluginFile, enable: bool, write_file: bool) -> Result<String> {
        if self.position(&file.filename).is_some() {
            return Err(Error::InvalidInput(format!("{} is already loaded", file.filename)));
        }

        let plugin = self.init_plugin(&file)?;
        let id = plugin.meta.id.clone();
        if self.position(&id).is_some() {
            warn!("Duplicate plugin id {} from {}", id, file.filename);
            return Err(Error::InvalidInput(format!("Plugin {} is already loaded", id)));
        }

        if write_file {
            self.write_file(&file.filename, &file.content)?;
        }

        self.plugins.push(plugin);
        self.sort();
        self.publish(EventKind::Added, &id);

        let idx = self.require(&id)?;
        if self.enabled.is_enabled(&id) {
            let _ = self.start_at(idx, false);
        } else if enable {
            let _ = self.enable(&id);
        } else {
            self.report(ToastKind::Info, format!("{} was added.", self.label(idx)));
        }

        Ok(id)
    }

    /// 내용이 바뀐 플러그인 반영
    ///
    /// 내용이 같으면 아무것도 하지 않고 `false`. 실행 중이었다면 조용히
    /// 재시작하고 결과를 토스트 하나로 알립니다.
    pub fn update_plugin(&mut self, id_or_file: &str, file: PluginFile, write_file: bool) -> Result<bool> {
        let idx = self.require(id_or_file)?;
        self.update_at(idx, file, write_file, false)
    }

    /// 일괄 업데이트용 (토스트 없음)
    pub(crate) fn update_plugin_quiet(&mut self, id_or_file: &str, file: PluginFile, write_file: bool) -> Result<bool> {
        let idx = self.require(id_or_file)?;
        self.update_at(idx, file, write_file, true)
    }

    fn update_at(&mut self, idx: usize, file: PluginFile, write_file: bool, quiet: bool) -> Result<bool> {
        if self.plugins[idx].meta.file_content == file.content {
            debug!("{} is unchanged, skipping update", file.filename);
            return Ok(false);
        }

        let file = file.with_added(self.plugins[idx].meta.added);
        let meta = self.init_plugin(&file)?.meta;

        if write_file {
            self.write_file(&meta.filename, &meta.file_content)?;
        }

        if self.plugins[idx].running {
            let _ = self.stop_at(idx, true);
        }

        let plugin = &mut self.plugins[idx];
        plugin.discard();
        plugin.meta = meta;

        // 재시작 여부는 EnabledSet 기준
        let restart = if self.enabled.is_enabled(&self.plugins[idx].meta.id) {
            Some(self.start_at(idx, true))
        } else {
            None
        };

        let id = self.plugins[idx].meta.id.clone();
        let label = self.label(idx);
        self.sort();
        self.publish(EventKind::Updated, &id);
        info!("Updated {}", label);

        if !quiet {
            match restart {
                Some(Err(e)) => self.report(
                    ToastKind::Error,
                    format!("{} was updated but could not be restarted: {}", label, e),
                ),
                _ => self.report(ToastKind::Success, format!("{} was updated.", label)),
            }
        }

        Ok(true)
    }

    /// 플러그인 삭제
    ///
    /// 파일을 먼저 지우고, 실행 중이면 토스트 없이 정지한 뒤 목록에서 빼고
    /// 삭제 토스트 하나만 냅니다. 파일 삭제가 실패하면 플러그인은 그대로 둡니다.
    pub fn delete_plugin(&mut self, id_or_file: &str, remove_file: bool) -> Result<()> {
        let idx = self.require(id_or_file)?;

        if remove_file {
            let filename = self.plugins[idx].meta.filename.clone();
            self.self_writes.mark(&filename);
            if let Err(e) = self.files.delete(&filename) {
                error!("Failed to delete {}: {}", filename, e);
                self.report(
                    ToastKind::Error,
                    format!("{} could not be deleted: {}", self.plugins[idx].name(), e),
                );
                return Err(e);
            }
        }

        if self.plugins[idx].running {
            let _ = self.stop_at(idx, true);
        }

        let plugin = self.plugins.remove(idx);
        self.publish(EventKind::Removed, &plugin.meta.id);
        info!("Removed {}", plugin.meta.filename);
        self.report(ToastKind::Success, format!("{} was deleted.", plugin.name()));
        Ok(())
    }

    /// 파일 변경 반영
    pub fn apply_change(&mut self, change: Reconcile) -> Result<()> {
        match change {
            Reconcile::Removed(filename) => {
                if self.position(&filename).is_none() {
                    debug!("Ignoring removal of unknown file {}", filename);
                    return Ok(());
                }
                self.delete_plugin(&filename, false)
            }
            Reconcile::Written(file) => {
                if self.position(&file.filename).is_some() {
                    let filename = file.filename.clone();
                    self.update_plugin(&filename, file, false).map(|_| ())
                } else {
                    self.create_plugin(file, false, false).map(|_| ())
                }
            }
        }
    }

    // ========================================================================
    // 일괄 연산
    // ========================================================================

    /// 시작 시 일괄 로드
    ///
    /// 메타데이터만 읽고 정렬한 뒤 활성화된 플러그인을 조용히 시작합니다.
    /// 결과는 요약 토스트 하나로 알립니다.
    pub fn load_all(&mut self, files: Vec<PluginFile>) -> LoadReport {
        let mut report = LoadReport::default();

        for file in files {
            let began = Instant::now();
            let plugin = match self.init_plugin(&file) {
                Ok(plugin) => plugin,
                Err(_) => {
                    report.skipped += 1;
                    continue;
                }
            };

            if self.position(&plugin.meta.id).is_some() {
                warn!("Skipping {}: plugin {} is already loaded", file.filename, plugin.meta.id);
                report.skipped += 1;
                continue;
            }

            info!(
                "Loaded {} in {:.2}ms",
                plugin.name(),
                began.elapsed().as_secs_f64() * 1000.0
            );
            self.plugins.push(plugin);
            report.loaded += 1;
        }

        self.sort();
        self.events.publish(AddonEvent::list(EventKind::Loaded));

        let ids: Vec<String> = self
            .plugins
            .iter()
            .filter(|p| self.enabled.is_enabled(&p.meta.id))
            .map(|p| p.meta.id.clone())
            .collect();

        for id in ids {
            let Some(idx) = self.position(&id) else { continue };
            match self.start_at(idx, true) {
                Ok(()) => report.started += 1,
                Err(_) => report.failed += 1,
            }
        }

        self.report_batch("started", report.started, report.failed);
        report
    }

    /// 모든 플러그인 활성화
    pub fn enable_all(&mut self) -> (usize, usize) {
        let ids: Vec<String> = self
            .plugins
            .iter()
            .filter(|p| !self.enabled.is_enabled(&p.meta.id) || !p.running)
            .map(|p| p.meta.id.clone())
            .collect();

        let (mut done, mut failed) = (0, 0);
        for id in ids {
            let Some(idx) = self.position(&id) else { continue };
            let outcome = self
                .start_at(idx, true)
                .and_then(|_| self.enabled.set_enabled(&id, true));
            match outcome {
                Ok(()) => {
                    self.publish(EventKind::Enabled, &id);
                    done += 1;
                }
                Err(_) => failed += 1,
            }
        }

        self.report_batch("enabled", done, failed);
        (done, failed)
    }

    /// 모든 플러그인 비활성화
    pub fn disable_all(&mut self) -> (usize, usize) {
        let ids: Vec<String> = self
            .plugins
            .iter()
            .filter(|p| self.enabled.is_enabled(&p.meta.id) || p.running)
            .map(|p| p.meta.id.clone())
            .collect();

        let (mut done, mut failed) = (0, 0);
        for id in ids {
            let Some(idx) = self.position(&id) else { continue };
            let stopped = self.stop_at(idx, true);
            match self.enabled.set_enabled(&id, false) {
                Ok(()) => {
                    self.publish(EventKind::Disabled, &id);
                    if stopped.is_ok() {
                        done += 1;
                    } else {
                        failed += 1;
                    }
                }
                Err(e) => {
                    warn!("Could not persist enabled flag for {}: {}", id, e);
                    failed += 1;
                }
            }
        }

        self.report_batch("disabled", done, failed);
        (done, failed)
    }

    fn report_batch(&self, verb: &str, done: usize, failed: usize) {
        if done == 0 && failed == 0 {
            return;
        }

        if failed == 0 {
            self.report(ToastKind::Success, format!("{} {} {}", done, plural(done), verb));
        } else {
            self.report(
                ToastKind::Warning,
                format!("{} {} {}, {} failed", done, plural(done), verb, failed),
            );
        }
    }

    // ========================================================================
    // 브로드캐스트
    // ========================================================================

    /// 화면 전환 알림
    pub fn on_switch(&mut self) {
        for plugin in self.plugins.iter_mut().filter(|p| p.running) {
            let name = plugin.meta.display_name().to_string();
            if let Some(instance) = plugin.instance.as_mut() {
                if !instance.has_method(methods::ON_SWITCH) {
                    continue;
                }
                if let Err(e) = instance.call(methods::ON_SWITCH, &[]) {
                    error!("onSwitch failed for {}: {}", name, e);
                }
            }
        }
    }

    /// DOM 변경 배치를 observer 가 있는 실행 중 인스턴스에 전달
    pub fn dispatch_mutations(&mut self, mutations: &[Mutation]) {
        let values: Vec<HostValue> = mutations.iter().map(Mutation::to_value).collect();

        for value in &values {
            for plugin in self.plugins.iter_mut().filter(|p| p.running) {
                let name = plugin.meta.display_name().to_string();
                if let Some(instance) = plugin.instance.as_mut() {
                    if !instance.has_method(methods::OBSERVER) {
                        continue;
                    }
                    if let Err(e) = instance.call(methods::OBSERVER, std::slice::from_ref(value)) {
                        error!("Plugin observer failed for {}: {}", name, e);
                    }
                }
            }
        }
    }

    // ========================================================================
    // 설정 패널
    // ========================================================================

    pub fn has_settings_panel(&self, id_or_file: &str) -> bool {
        self.get(id_or_file)
            .map_or(false, |p| p.has_method(methods::GET_SETTINGS_PANEL))
    }

    /// `getSettingsPanel()` 호출
    pub fn settings_panel(&mut self, id_or_file: &str) -> Result<HostValue> {
        let idx = self.require(id_or_file)?;
        let plugin = &mut self.plugins[idx];
        let name = plugin.meta.display_name().to_string();

        let instance = plugin
            .instance
            .as_mut()
            .filter(|i| i.has_method(methods::GET_SETTINGS_PANEL))
            .ok_or_else(|| Error::NotFound(format!("{} has no settings panel", name)))?;

        match instance.call(methods::GET_SETTINGS_PANEL, &[]) {
            Ok(panel) => Ok(panel),
            Err(e) => {
                let err = Error::runtime(&name, e.message);
                error!("Unable to get settings panel for {}: {}", name, err);
                self.report(ToastKind::Error, format!("Unable to open settings of {}", name));
                Err(err)
            }
        }
    }

    // ========================================================================
    // 시작 시퀀스
    // ========================================================================

    /// 파일 목록을 읽어 일괄 로드
    ///
    /// 파일 읽기는 잠금 밖에서 기다립니다.
    pub async fn initialize(shared: &SharedManager) -> Result<LoadReport> {
        let files = Arc::clone(shared.lock().files());
        let listed = files.list().await?;
        Ok(shared.lock().load_all(listed))
    }
}
