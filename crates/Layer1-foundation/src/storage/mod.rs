//! Storage module for AddonBridge
//!
//! - `json`: JSON - 범용 파일 저장/로드
//! - `settings`: Enabled Set - 플러그인 활성화 플래그

mod json;
mod settings;

// JSON Storage (범용)
pub use json::JsonStore;

// Enabled Set
pub use settings::{
    EnabledStore, JsonEnabledStore, MemoryEnabledStore, ENABLED_NAMESPACE, SETTINGS_FILE,
};
