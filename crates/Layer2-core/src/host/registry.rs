//! Module Registry - 호스트 번들러의 모듈 저장소 인터페이스
//!
//! 호스트는 정수(또는 문자열) id 로 모듈을 관리합니다. 이미 로드된 모듈은
//! 동기로 열거할 수 있고, 새로 등록되는 모듈은 구독 채널로 알림을 받습니다.
//! 아직 로드되지 않은 모듈은 팩토리 소스만 존재하며, 청크를 로드한 뒤
//! `require` 해야 export 가 생깁니다.

use async_trait::async_trait;
use bridge_foundation::{Error, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::HostValue;

/// 등록 알림 채널 용량
const REGISTRATION_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// ModuleId / ModuleRecord
// ============================================================================

/// 모듈 id - 숫자 id 가 문자열 id 보다 먼저 정렬됨
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleId {
    Num(u64),
    Named(String),
}

impl From<u64> for ModuleId {
    fn from(id: u64) -> Self {
        ModuleId::Num(id)
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        match id.parse::<u64>() {
            Ok(n) => ModuleId::Num(n),
            Err(_) => ModuleId::Named(id.to_string()),
        }
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        ModuleId::from(id.as_str())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleId::Num(n) => write!(f, "{}", n),
            ModuleId::Named(s) => f.write_str(s),
        }
    }
}

/// 로드된 모듈
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub id: ModuleId,
    pub exports: HostValue,
    /// 모듈 팩토리의 소스 텍스트
    pub source: Option<Arc<str>>,
}

impl ModuleRecord {
    pub fn new(id: impl Into<ModuleId>, exports: HostValue) -> Self {
        Self {
            id: id.into(),
            exports,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl AsRef<str>) -> Self {
        self.source = Some(Arc::from(source.as_ref()));
        self
    }
}

// ============================================================================
// ModuleRegistry trait
// ============================================================================

/// 호스트 모듈 저장소
#[async_trait]
pub trait ModuleRegistry: Send + Sync {
    /// 로드된 모듈 id (오름차순)
    fn module_ids(&self) -> Vec<ModuleId>;

    /// 로드된 모듈 조회
    fn module(&self, id: &ModuleId) -> Option<ModuleRecord>;

    /// 모듈 팩토리 소스 (로드 여부와 무관)
    fn factory_source(&self, id: &ModuleId) -> Option<Arc<str>>;

    /// 새 모듈 등록 알림 구독
    fn subscribe(&self) -> broadcast::Receiver<ModuleRecord>;

    /// 지연 청크 로드
    async fn load_chunk(&self, chunk_id: &str) -> Result<()>;

    /// 모듈 실행 (이미 로드되어 있으면 기존 export)
    fn require(&self, id: &ModuleId) -> Option<HostValue>;
}

// ============================================================================
// MemoryRegistry
// ============================================================================

/// 아직 실행되지 않은 모듈 팩토리
#[derive(Debug, Clone)]
struct PendingFactory {
    source: Arc<str>,
    exports: HostValue,
}

/// 메모리 전용 모듈 저장소 (테스트/임베딩용)
pub struct MemoryRegistry {
    loaded: RwLock<BTreeMap<ModuleId, ModuleRecord>>,
    factories: RwLock<HashMap<ModuleId, PendingFactory>>,
    chunks: RwLock<HashMap<String, Vec<(ModuleId, PendingFactory)>>>,
    loaded_chunks: RwLock<HashSet<String>>,
    sender: broadcast::Sender<ModuleRecord>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(REGISTRATION_CHANNEL_CAPACITY);
        Self {
            loaded: RwLock::new(BTreeMap::new()),
            factories: RwLock::new(HashMap::new()),
            chunks: RwLock::new(HashMap::new()),
            loaded_chunks: RwLock::new(HashSet::new()),
            sender,
        }
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 로드된 모듈 등록 (구독자에게 알림)
    pub fn insert(&self, record: ModuleRecord) {
        debug!("Registering module {}", record.id);
        self.loaded.write().insert(record.id.clone(), record.clone());
        let _ = self.sender.send(record);
    }

    /// 로드된 모듈 등록 (export 만)
    pub fn define(&self, id: impl Into<ModuleId>, exports: HostValue) {
        self.insert(ModuleRecord::new(id, exports));
    }

    /// 실행 전 팩토리 등록 - `require` 시 로드됨
    pub fn define_factory(&self, id: impl Into<ModuleId>, source: &str, exports: HostValue) {
        self.factories.write().insert(
            id.into(),
            PendingFactory {
                source: Arc::from(source),
                exports,
            },
        );
    }

    /// 지연 청크 등록 - 청크 로드 시 포함된 팩토리가 정의됨
    pub fn define_chunk<I>(&self, chunk_id: &str, modules: I)
    where
        I: IntoIterator<Item = (ModuleId, String, HostValue)>,
    {
        let factories = modules
            .into_iter()
            .map(|(id, source, exports)| {
                (
                    id,
                    PendingFactory {
                        source: Arc::from(source),
                        exports,
                    },
                )
            })
            .collect();
        self.chunks.write().insert(chunk_id.to_string(), factories);
    }

    /// 현재 구독자 수
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// 청크 로드 여부
    pub fn is_chunk_loaded(&self, chunk_id: &str) -> bool {
        self.loaded_chunks.read().contains(chunk_id)
    }
}

#[async_trait]
impl ModuleRegistry for MemoryRegistry {
    fn module_ids(&self) -> Vec<ModuleId> {
        self.loaded.read().keys().cloned().collect()
    }

    fn module(&self, id: &ModuleId) -> Option<ModuleRecord> {
        self.loaded.read().get(id).cloned()
    }

    fn factory_source(&self, id: &ModuleId) -> Option<Arc<str>> {
        if let Some(record) = self.loaded.read().get(id) {
            if let Some(source) = &record.source {
                return Some(source.clone());
            }
        }
        self.factories.read().get(id).map(|f| f.source.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<ModuleRecord> {
        self.sender.subscribe()
    }

    async fn load_chunk(&self, chunk_id: &str) -> Result<()> {
        if self.is_chunk_loaded(chunk_id) {
            return Ok(());
        }

        let modules = self
            .chunks
            .read()
            .get(chunk_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("chunk {}", chunk_id)))?;

        debug!("Loading chunk {} ({} modules)", chunk_id, modules.len());
        let mut factories = self.factories.write();
        for (id, factory) in modules {
            factories.entry(id).or_insert(factory);
        }
        drop(factories);

        self.loaded_chunks.write().insert(chunk_id.to_string());
        Ok(())
    }

    fn require(&self, id: &ModuleId) -> Option<HostValue> {
        if let Some(record) = self.loaded.read().get(id) {
            return Some(record.exports.clone());
        }

        let factory = self.factories.write().remove(id)?;
        let record = ModuleRecord {
            id: id.clone(),
            exports: factory.exports.clone(),
            source: Some(factory.source),
        };
        self.insert(record);
        Some(factory.exports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_id_ordering() {
        let mut ids = vec![
            ModuleId::from("named"),
            ModuleId::Num(42),
            ModuleId::from("7"),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![ModuleId::Num(7), ModuleId::Num(42), ModuleId::Named("named".into())]
        );
    }

    #[test]
    fn test_define_notifies_subscribers() {
        let registry = MemoryRegistry::new();
        let mut rx = registry.subscribe();

        registry.define(ModuleId::Num(1), HostValue::from("a"));

        let record = rx.try_recv().unwrap();
        assert_eq!(record.id, ModuleId::Num(1));
        assert_eq!(registry.module_ids(), vec![ModuleId::Num(1)]);
    }

    #[tokio::test]
    async fn test_chunk_then_require() {
        let registry = MemoryRegistry::new();
        registry.define_chunk(
            "99",
            vec![(ModuleId::Num(5), "function(){}".to_string(), HostValue::from("lazy"))],
        );

        assert!(registry.require(&ModuleId::Num(5)).is_none());
        registry.load_chunk("99").await.unwrap();
        assert!(registry.is_chunk_loaded("99"));

        assert_eq!(registry.require(&ModuleId::Num(5)), Some(HostValue::from("lazy")));
        assert!(registry.module(&ModuleId::Num(5)).is_some());
    }

    #[tokio::test]
    async fn test_unknown_chunk_fails() {
        let registry = MemoryRegistry::new();
        assert!(registry.load_chunk("nope").await.is_err());
    }
}
