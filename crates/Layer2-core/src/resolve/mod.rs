//! Resolve - 호스트 모듈 탐색
//!
//! - `filters`: export 판별 predicate (byKeys, byStrings, bySource ...)
//! - `search`: 동기 탐색 / 일괄 탐색 (ModuleResolver)
//! - `lazy`: 등록을 기다리는 비동기 탐색
//! - `force_load`: 지연 청크 강제 로드
//! - `stores`: 상태 저장소 탐색
//! - `primitives`: 시작 시 해결하는 핵심 모듈 테이블
//! - `cache`: cache id → 결과

mod cache;
pub mod filters;
mod force_load;
mod lazy;
mod primitives;
mod search;
mod stores;

pub use cache::ResolutionCache;
pub use filters::{Filter, FilterFn, DEFAULT_KEYS};
pub use force_load::{BundlerChunkPattern, ChunkPattern, LazyTarget};
pub use lazy::LazyOptions;
pub use primitives::{core_queries, HostPrimitives, REACT_DOM};
pub use search::{ModuleMatch, ModuleQuery, ModuleResolver, SearchOptions};
