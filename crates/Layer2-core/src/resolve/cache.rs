//! Resolution Cache - cache id → 탐색 결과
//!
//! 한번 찾은 값은 세션 동안 유지됩니다. 호스트가 모듈을 교체하지 않으므로
//! 무효화 경로는 두지 않습니다.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::host::HostValue;

/// 탐색 결과 캐시
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: RwLock<HashMap<String, HostValue>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cache_id: &str) -> Option<HostValue> {
        self.entries.read().get(cache_id).cloned()
    }

    /// 첫 결과만 기록 (이미 있으면 기존 값 유지)
    pub fn insert(&self, cache_id: &str, value: &HostValue) {
        self.entries
            .write()
            .entry(cache_id.to_string())
            .or_insert_with(|| value.clone());
    }

    pub fn contains(&self, cache_id: &str) -> bool {
        self.entries.read().contains_key(cache_id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_result_wins() {
        let cache = ResolutionCache::new();
        let first = HostValue::function("a");
        let second = HostValue::function("b");

        cache.insert("core-React", &first);
        cache.insert("core-React", &second);

        assert_eq!(cache.get("core-React"), Some(first));
        assert_eq!(cache.len(), 1);
    }
}
