//! # Plugin System
//!
//! `.plugin.js` 파일 하나가 플러그인 하나입니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PluginManager                           │
//! │  ┌───────────────────────────────────────────────────────┐ │
//! │  │            AddonList (표시 이름순)                      │ │
//! │  │  ┌────────────┬────────────┬────────────────────┐    │ │
//! │  │  │ Plugin A   │ Plugin B   │ Plugin C           │    │ │
//! │  │  │ (Running)  │ (Loaded)   │ (Loaded, instance) │    │ │
//! │  │  └────────────┴────────────┴────────────────────┘    │ │
//! │  └───────────────────────────────────────────────────────┘ │
//! │        │              │              │            │         │
//! │   PluginLoader   EnabledStore   AddonFiles   MutationHub    │
//! │   (ScriptEngine) (settings)     (watcher)    (observer)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 모듈
//!
//! - `meta`: 헤더 주석 → `PluginMeta` (코드 실행 없음)
//! - `loader`: 소스 평가와 인스턴스 생성 (외부 코드 실행 경계)
//! - `manager`: 라이프사이클 (start/stop/enable/disable/update/delete)
//! - `files` / `watcher`: 파일 접근과 변경 반영
//! - `catalog`: 원격 스토어와 업데이트
//! - `observer`: 공유 DOM 변경 감시자
//! - `events`: 목록 변경 알림
//!
//! ## 예시
//!
//! ```ignore
//! let manager = PluginManager::new(engine, files, enabled, notifier).into_shared();
//! let handles = bootstrap(&manager, &config.watch).await?;
//!
//! manager.lock().enable("Foo")?;
//! ```

pub mod catalog;
pub mod events;
pub mod files;
pub mod loader;
pub mod manager;
pub mod meta;
pub mod observer;
pub mod watcher;

pub use catalog::{
    AvailableUpdate, CatalogAuthor, CatalogEntry, CatalogSource, HttpCatalogSource, PluginCatalog,
    UpdateReport, UPDATE_ALL_ACTION, UPDATE_NOTIFICATION_ID,
};
pub use events::{AddonEvent, AddonEventHandler, EventBus, EventKind};
pub use files::{AddonFiles, ChangeKind, FileChange, FsAddonFiles, MemoryAddonFiles, PluginFile};
pub use loader::{
    ConstructHow, EvaluatedExport, ExportedCallable, ModuleSource, PluginInstance, PluginLoader,
    ScriptEngine, ScriptError,
};
pub use manager::{
    LoadReport, ManagerStats, Plugin, PluginManager, PluginManagerConfig, PluginState,
    PluginSummary, Reconcile, ReloadMode, SharedManager,
};
pub use meta::{parse_header, HeaderFields, MetaValue, PluginMeta};
pub use observer::{Mutation, MutationHub, MutationKind, MutationSource};
pub use watcher::{bootstrap, watch_changes, ChangeDebouncer, SelfWriteGuard, WatchHandles};
