//! Config - 통합 설정 관리
//!
//! - `bridge.rs` - BridgeConfig 통합 설정

mod bridge;

pub use bridge::{
    BridgeConfig, WatchConfig, BRIDGE_CONFIG_FILE, DEFAULT_STORE_URL, PLUGIN_SUFFIX,
};
