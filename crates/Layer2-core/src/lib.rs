//! bridge-core: Core Runtime for AddonBridge
//!
//! Layer2 - 모듈 탐색과 플러그인 라이프사이클
//!
//! # 주요 모듈
//!
//! - `host`: 호스트 값 모델과 모듈 저장소 인터페이스
//! - `resolve`: 모듈 탐색 엔진 (동기, 비동기, 일괄, 강제 로드)
//! - `plugin`: 플러그인 매니저, 로더, 파일 감시, 스토어 업데이트
//! - `toast`: 알림 싱크
//! - `command`: 명령 팔레트 어댑터 (bdsettings, bdtoggle)
//! - `contextmenu`: 설정 메뉴 어댑터
//! - `api`: 애드온 API
//!
//! # 사용 예시
//!
//! ```ignore
//! use bridge_core::{ModuleResolver, PluginManager, HostPrimitives, bootstrap};
//!
//! // 호스트 모듈 해결
//! let resolver = ModuleResolver::new(registry);
//! let primitives = HostPrimitives::load(&resolver);
//!
//! // 플러그인 로드 + 감시
//! let manager = PluginManager::new(engine, files, enabled, notifier).into_shared();
//! let handles = bootstrap(&manager, &config.watch).await?;
//! ```

// Core modules
pub mod api;
pub mod command;
pub mod contextmenu;
pub mod host;
pub mod plugin;
pub mod resolve;
pub mod toast;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports: Host
pub use host::{HostValue, MemoryRegistry, ModuleId, ModuleRecord, ModuleRegistry};

// Re-exports: Resolve
pub use resolve::{
    core_queries, Filter, HostPrimitives, LazyOptions, ModuleMatch, ModuleQuery, ModuleResolver,
    ResolutionCache, SearchOptions,
};

// Re-exports: Plugin
pub use plugin::{
    bootstrap, AddonFiles, EventBus, FsAddonFiles, MemoryAddonFiles, PluginCatalog, PluginFile,
    PluginManager, PluginManagerConfig, PluginMeta, PluginSummary, ReloadMode, ScriptEngine,
    SharedManager,
};

// Re-exports: Adapters
pub use api::AddonApi;
pub use command::{register_plugin_commands, Command, CommandRegistry, CommandSet};
pub use contextmenu::{patch_settings_menu, ContextMenuPatcher, MenuItem};
pub use toast::{LogNotifier, Notification, NotificationCenter, Notifier, Toast, ToastKind};
