//! # bridge-foundation
//!
//! Foundation layer for AddonBridge:
//! - Error: 에러 분류 (설정, 저장소, 플러그인, 네트워크)
//! - Config: 통합 설정 (BridgeConfig, WatchConfig)
//! - Storage: JsonStore (범용), EnabledStore (플러그인 활성화 플래그)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  bridge-core (PluginManager, Resolver ...)              │
//! │                     │                                   │
//! │          ┌─────────┴─────────┐                         │
//! │          ▼                   ▼                         │
//! │   EnabledStore          BridgeConfig                   │
//! │   (settings.json)       (bridge.json)                  │
//! │          └─────────┬─────────┘                         │
//! │                    ▼                                   │
//! │                JsonStore                               │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    BridgeConfig, WatchConfig, BRIDGE_CONFIG_FILE, DEFAULT_STORE_URL, PLUGIN_SUFFIX,
};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{
    EnabledStore, JsonEnabledStore, JsonStore, MemoryEnabledStore, ENABLED_NAMESPACE,
    SETTINGS_FILE,
};
