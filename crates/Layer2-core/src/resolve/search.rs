//! Module Search - 동기 탐색 엔진
//!
//! 탐색 순서: 캐시 → firstId 힌트 → 전체 모듈 (id 오름차순).
//! 결과를 찾으면 cacheId 로 기록하고, 못 찾으면 `None` 을 반환합니다.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::cache::ResolutionCache;
use super::filters::{default_key, should_skip_module, Filter};
use super::force_load::{BundlerChunkPattern, ChunkPattern};
use crate::host::{HostValue, ModuleId, ModuleRecord, ModuleRegistry};

// ============================================================================
// SearchOptions
// ============================================================================

/// 탐색 옵션
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// 모듈의 모든 export 값을 검사
    pub search_exports: bool,
    /// 모듈의 기본 export 값을 검사
    pub search_default: bool,
    /// 기본 export 가 일치하면 그 값을 반환 (false 면 모듈 전체)
    pub default_export: bool,
    /// 결과 캐시 키
    pub cache_id: Option<String>,
    /// 먼저 검사할 모듈 id
    pub first_id: Option<ModuleId>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_exports: false,
            search_default: true,
            default_export: true,
            cache_id: None,
            first_id: None,
        }
    }
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_exports(mut self, enabled: bool) -> Self {
        self.search_exports = enabled;
        self
    }

    pub fn search_default(mut self, enabled: bool) -> Self {
        self.search_default = enabled;
        self
    }

    pub fn default_export(mut self, enabled: bool) -> Self {
        self.default_export = enabled;
        self
    }

    pub fn cache_id(mut self, id: impl Into<String>) -> Self {
        self.cache_id = Some(id.into());
        self
    }

    pub fn first_id(mut self, id: impl Into<ModuleId>) -> Self {
        self.first_id = Some(id.into());
        self
    }
}

/// 필터 + 옵션
#[derive(Debug, Clone)]
pub struct ModuleQuery {
    pub filter: Filter,
    pub options: SearchOptions,
}

impl ModuleQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            options: SearchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }
}

/// 탐색 결과 - 일치한 값과 그 export 키
#[derive(Debug, Clone)]
pub struct ModuleMatch {
    pub value: HostValue,
    /// 모듈 전체가 일치했으면 `None`
    pub key: Option<String>,
    pub id: ModuleId,
}

/// 모듈 하나에 대한 필터 적용
///
/// 1. 모듈 export 전체
/// 2. searchExports 면 모든 export 값, 아니면 searchDefault 일 때 기본 export 값
pub(crate) fn test_module(
    filter: &Filter,
    module: &ModuleRecord,
    options: &SearchOptions,
) -> Option<ModuleMatch> {
    let exports = &module.exports;
    if should_skip_module(exports) {
        return None;
    }

    if filter.matches(exports, module, &module.id) {
        return Some(ModuleMatch {
            value: exports.clone(),
            key: None,
            id: module.id.clone(),
        });
    }

    if !options.search_exports && !options.search_default {
        return None;
    }

    let default = default_key(exports);
    let keys: Vec<&str> = if options.search_exports {
        exports.keys()
    } else {
        default.into_iter().collect()
    };

    for key in keys {
        let Some(exported) = exports.get(key) else {
            continue;
        };
        if should_skip_module(exported) || !filter.matches(exported, module, &module.id) {
            continue;
        }

        if !options.default_export && Some(key) == default {
            return Some(ModuleMatch {
                value: exports.clone(),
                key: None,
                id: module.id.clone(),
            });
        }
        return Some(ModuleMatch {
            value: exported.clone(),
            key: Some(key.to_string()),
            id: module.id.clone(),
        });
    }

    None
}

// ============================================================================
// ModuleResolver
// ============================================================================

/// 호스트 모듈 탐색기
pub struct ModuleResolver {
    pub(crate) registry: Arc<dyn ModuleRegistry>,
    pub(crate) cache: ResolutionCache,
    pub(crate) chunk_pattern: Arc<dyn ChunkPattern>,
}

impl ModuleResolver {
    /// 새 탐색기 생성
    pub fn new(registry: Arc<dyn ModuleRegistry>) -> Self {
        Self {
            registry,
            cache: ResolutionCache::new(),
            chunk_pattern: Arc::new(BundlerChunkPattern::new()),
        }
    }

    /// 지연 청크 패턴 교체
    pub fn with_chunk_pattern(mut self, pattern: Arc<dyn ChunkPattern>) -> Self {
        self.chunk_pattern = pattern;
        self
    }

    pub fn registry(&self) -> &Arc<dyn ModuleRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    // ========================================================================
    // 단일 탐색
    // ========================================================================

    /// 첫 번째로 일치하는 값
    pub fn get(&self, filter: &Filter, options: &SearchOptions) -> Option<HostValue> {
        self.find(filter, options).map(|m| m.value)
    }

    /// 첫 번째로 일치하는 값과 export 키
    pub fn get_with_key(
        &self,
        filter: &Filter,
        options: &SearchOptions,
    ) -> Option<(HostValue, Option<String>)> {
        if let Some(cached) = self.cached(options) {
            return Some((cached, None));
        }
        self.scan(filter, options).map(|m| {
            self.remember(options, &m.value);
            (m.value, m.key)
        })
    }

    /// 첫 번째로 일치하는 모듈 정보
    pub fn find(&self, filter: &Filter, options: &SearchOptions) -> Option<ModuleMatch> {
        if let Some(cache_id) = &options.cache_id {
            if let Some(value) = self.cache.get(cache_id) {
                return Some(ModuleMatch {
                    value,
                    key: None,
                    id: ModuleId::Named(cache_id.clone()),
                });
            }
        }

        let found = self.scan(filter, options);
        match &found {
            Some(m) => {
                debug!("{} resolved in module {}", filter.label(), m.id);
                self.remember(options, &m.value);
            }
            None => debug!("{} did not match any module", filter.label()),
        }
        found
    }

    /// 일치하는 모든 값 (id 오름차순)
    pub fn get_all(&self, filter: &Filter, options: &SearchOptions) -> Vec<HostValue> {
        self.registry
            .module_ids()
            .iter()
            .filter_map(|id| self.registry.module(id))
            .filter_map(|module| test_module(filter, &module, options))
            .map(|m| m.value)
            .collect()
    }

    // ========================================================================
    // 일괄 탐색
    // ========================================================================

    /// 여러 쿼리를 한 번의 순회로 해결
    ///
    /// 찾지 못한 이름은 결과에서 빠집니다.
    pub fn get_bulk(&self, queries: &[(&str, ModuleQuery)]) -> HashMap<String, HostValue> {
        let mut found: HashMap<String, HostValue> = HashMap::new();
        let mut pending: Vec<&(&str, ModuleQuery)> = Vec::new();

        for entry in queries {
            let (name, query) = entry;
            if let Some(value) = self.cached(&query.options) {
                found.insert(name.to_string(), value);
                continue;
            }
            let hinted = query
                .options
                .first_id
                .as_ref()
                .and_then(|id| self.registry.module(id))
                .and_then(|module| test_module(&query.filter, &module, &query.options));
            match hinted {
                Some(m) => {
                    self.remember(&query.options, &m.value);
                    found.insert(name.to_string(), m.value);
                }
                None => pending.push(entry),
            }
        }

        if !pending.is_empty() {
            for id in self.registry.module_ids() {
                let Some(module) = self.registry.module(&id) else {
                    continue;
                };
                pending.retain(|(name, query)| {
                    match test_module(&query.filter, &module, &query.options) {
                        Some(m) => {
                            self.remember(&query.options, &m.value);
                            found.insert(name.to_string(), m.value);
                            false
                        }
                        None => true,
                    }
                });
                if pending.is_empty() {
                    break;
                }
            }
        }

        for (name, query) in &pending {
            warn!("Bulk query {} ({}) found nothing", name, query.filter.label());
        }
        found
    }

    // ========================================================================
    // 내부
    // ========================================================================

    pub(crate) fn cached(&self, options: &SearchOptions) -> Option<HostValue> {
        options.cache_id.as_deref().and_then(|id| self.cache.get(id))
    }

    pub(crate) fn remember(&self, options: &SearchOptions, value: &HostValue) {
        if let Some(cache_id) = &options.cache_id {
            self.cache.insert(cache_id, value);
        }
    }

    /// firstId 힌트 → 전체 순회
    fn scan(&self, filter: &Filter, options: &SearchOptions) -> Option<ModuleMatch> {
        if let Some(first_id) = &options.first_id {
            let hinted = self
                .registry
                .module(first_id)
                .and_then(|module| test_module(filter, &module, options));
            if hinted.is_some() {
                return hinted;
            }
            debug!("Hint {} missed for {}", first_id, filter.label());
        }

        self.registry
            .module_ids()
            .iter()
            .filter(|id| options.first_id.as_ref() != Some(*id))
            .filter_map(|id| self.registry.module(id))
            .find_map(|module| test_module(filter, &module, options))
    }
}
