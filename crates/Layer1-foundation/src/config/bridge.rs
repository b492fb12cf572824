//! Bridge Config - 통합 설정
//!
//! 플러그인 폴더, 변경 감지, 스토어, 알림 설정을 하나로 관리

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 설정 파일명
pub const BRIDGE_CONFIG_FILE: &str = "bridge.json";

/// 플러그인 파일 확장자
pub const PLUGIN_SUFFIX: &str = ".plugin.js";

/// 기본 플러그인 카탈로그 주소
pub const DEFAULT_STORE_URL: &str = "https://api.betterdiscord.app/v3/store/plugins";

// ============================================================================
// Bridge Config (통합)
// ============================================================================

/// AddonBridge 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// 플러그인 폴더 (없으면 data_dir/plugins)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins_dir: Option<PathBuf>,

    /// 데이터 폴더 (없으면 플랫폼 기본값)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// 원격 카탈로그 주소
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// 시작 시 업데이트 확인
    #[serde(default = "default_true")]
    pub check_updates: bool,

    /// 토스트 표시 시간 (ms)
    #[serde(default = "default_toast_timeout")]
    pub toast_timeout_ms: u64,

    /// 파일 변경 감지
    #[serde(default)]
    pub watch: WatchConfig,
}

fn default_version() -> u32 {
    1
}

fn default_store_url() -> String {
    DEFAULT_STORE_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_toast_timeout() -> u64 {
    5000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            plugins_dir: None,
            data_dir: None,
            store_url: default_store_url(),
            check_updates: true,
            toast_timeout_ms: default_toast_timeout(),
            watch: WatchConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 설정 로드 (없으면 기본값)
    pub fn load() -> Result<Self> {
        let store = JsonStore::global()?;
        Ok(store.load_or_default(BRIDGE_CONFIG_FILE))
    }

    /// 지정 저장소에서 로드
    pub fn load_from(store: &JsonStore) -> Result<Self> {
        Ok(store
            .load_optional::<BridgeConfig>(BRIDGE_CONFIG_FILE)?
            .unwrap_or_default())
    }

    /// 글로벌 설정 저장
    pub fn save(&self) -> Result<()> {
        JsonStore::global()?.save(BRIDGE_CONFIG_FILE, self)
    }

    // ========================================================================
    // 경로
    // ========================================================================

    /// 데이터 폴더
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|d| d.join("addonbridge"))
            .ok_or_else(|| Error::Config("Cannot find data directory".to_string()))
    }

    /// 플러그인 폴더
    pub fn plugins_dir(&self) -> Result<PathBuf> {
        match &self.plugins_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.data_dir()?.join("plugins")),
        }
    }

    /// 플러그인 폴더 (없으면 생성)
    pub fn ensure_plugins_dir(&self) -> Result<PathBuf> {
        let dir = self.plugins_dir()?;
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }

    /// 토스트 표시 시간
    pub fn toast_timeout(&self) -> Duration {
        Duration::from_millis(self.toast_timeout_ms)
    }
}

// ============================================================================
// Watch Config
// ============================================================================

/// 파일 변경 감지 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    /// 같은 파일의 연속 이벤트를 하나로 합치는 구간 (ms)
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    /// 직접 쓴 파일의 이벤트를 무시하는 구간 (ms)
    #[serde(default = "default_self_write_ignore")]
    pub self_write_ignore_ms: u64,
}

fn default_debounce() -> u64 {
    250
}

fn default_self_write_ignore() -> u64 {
    1000
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            self_write_ignore_ms: default_self_write_ignore(),
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn self_write_ignore(&self) -> Duration {
        Duration::from_millis(self.self_write_ignore_ms)
    }
}
