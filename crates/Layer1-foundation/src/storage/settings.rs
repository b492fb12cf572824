//! Enabled Set - 플러그인 활성화 여부 저장소
//!
//! "이 플러그인이 실행 중이어야 하는가"에 대한 유일한 기준입니다.
//! 플러그인 매니저는 자체적으로 bool 을 캐시하지 않고 항상 여기를 조회합니다.

use super::JsonStore;
use crate::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// 설정 파일명
pub const SETTINGS_FILE: &str = "settings.json";

/// 플러그인 활성화 플래그가 저장되는 네임스페이스
pub const ENABLED_NAMESPACE: &str = "bdplugins";

// ============================================================================
// EnabledStore trait
// ============================================================================

/// 플러그인 id → bool 저장소
///
/// 읽기/쓰기 모두 동기이며, 쓰기는 재시작 후에도 유지되어야 합니다.
pub trait EnabledStore: Send + Sync {
    /// 활성화 여부 (없으면 false)
    fn is_enabled(&self, id: &str) -> bool;

    /// 활성화 여부 설정
    fn set_enabled(&self, id: &str, enabled: bool) -> Result<()>;

    /// 전체 스냅샷
    fn snapshot(&self) -> BTreeMap<String, bool>;
}

// ============================================================================
// MemoryEnabledStore
// ============================================================================

/// 메모리 전용 구현 (테스트/임베딩용)
#[derive(Debug, Default)]
pub struct MemoryEnabledStore {
    flags: RwLock<BTreeMap<String, bool>>,
}

impl MemoryEnabledStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 초기값과 함께 생성
    pub fn with_enabled<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let flags = ids.into_iter().map(|id| (id.into(), true)).collect();
        Self {
            flags: RwLock::new(flags),
        }
    }
}

impl EnabledStore for MemoryEnabledStore {
    fn is_enabled(&self, id: &str) -> bool {
        self.flags.read().get(id).copied().unwrap_or(false)
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.flags.write().insert(id.to_string(), enabled);
        Ok(())
    }

    fn snapshot(&self) -> BTreeMap<String, bool> {
        self.flags.read().clone()
    }
}

// ============================================================================
// JsonEnabledStore
// ============================================================================

/// settings.json 구조
///
/// 알 수 없는 키는 그대로 보존합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default, rename = "bdplugins")]
    enabled: BTreeMap<String, bool>,

    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

/// settings.json 기반 구현 (write-through)
pub struct JsonEnabledStore {
    store: JsonStore,
    cache: RwLock<SettingsFile>,
}

impl JsonEnabledStore {
    /// 저장소를 열고 기존 값을 로드
    pub fn open(store: JsonStore) -> Result<Self> {
        let file = store
            .load_optional::<SettingsFile>(SETTINGS_FILE)?
            .unwrap_or_default();
        debug!(
            "Loaded {} {} flags from {}",
            file.enabled.len(),
            ENABLED_NAMESPACE,
            store.file_path(SETTINGS_FILE).display()
        );
        Ok(Self {
            store,
            cache: RwLock::new(file),
        })
    }
}

impl EnabledStore for JsonEnabledStore {
    fn is_enabled(&self, id: &str) -> bool {
        self.cache.read().enabled.get(id).copied().unwrap_or(false)
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let mut cache = self.cache.write();
        let previous = cache.enabled.insert(id.to_string(), enabled);
        if let Err(e) = self.store.save(SETTINGS_FILE, &*cache) {
            // 저장 실패 시 메모리 상태도 되돌림
            match previous {
                Some(value) => cache.enabled.insert(id.to_string(), value),
                None => cache.enabled.remove(id),
            };
            return Err(e);
        }
        Ok(())
    }

    fn snapshot(&self) -> BTreeMap<String, bool> {
        self.cache.read().enabled.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryEnabledStore::with_enabled(["Foo"]);
        assert!(store.is_enabled("Foo"));
        assert!(!store.is_enabled("Bar"));

        store.set_enabled("Foo", false).unwrap();
        assert!(!store.is_enabled("Foo"));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_json_store_is_durable() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = JsonEnabledStore::open(JsonStore::new(dir.path())).unwrap();
            store.set_enabled("Foo", true).unwrap();
            store.set_enabled("Bar", false).unwrap();
        }

        let reopened = JsonEnabledStore::open(JsonStore::new(dir.path())).unwrap();
        assert!(reopened.is_enabled("Foo"));
        assert!(!reopened.is_enabled("Bar"));
        assert!(!reopened.is_enabled("Unknown"));
    }

    #[test]
    fn test_json_store_preserves_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{ "theme": "dark", "bdplugins": { "Foo": true } }"#,
        )
        .unwrap();

        let store = JsonEnabledStore::open(JsonStore::new(dir.path())).unwrap();
        store.set_enabled("Bar", true).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap())
                .unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["bdplugins"]["Foo"], true);
        assert_eq!(raw["bdplugins"]["Bar"], true);
    }
}
