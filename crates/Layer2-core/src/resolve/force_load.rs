//! Force Load - 지연 로드되는 모듈을 강제로 불러오기
//!
//! 모듈 팩토리 소스에서 번들러의 지연 로드 패턴(청크 id 목록 + 최종 모듈 id)을
//! 찾아 청크를 모두 로드한 뒤 최종 모듈을 실행합니다.
//! 패턴은 번들러 출력 형식에 의존하므로 `ChunkPattern` 으로 교체할 수 있습니다.

use bridge_foundation::Result;
use futures::future::try_join_all;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use super::search::ModuleResolver;
use crate::host::{HostValue, ModuleId};

lazy_static! {
    /// `n.e("123")` - 청크 로드 호출
    static ref CHUNK_ID: Regex = Regex::new(r#"n\.e\("(\d+)"\)"#).expect("valid chunk id pattern");
    /// `n.bind(n, 456)` - 최종 모듈 require
    static ref FINAL_MODULE_ID: Regex =
        Regex::new(r"n\.bind\(n,\s*(\d+)\s*\)").expect("valid final module pattern");
    /// `createPromise: () => ... .then(n.bind(n, 456))`
    static ref CREATE_PROMISE: Regex =
        Regex::new(r"createPromise:\s*\(\)\s*=>\s*([^}]+)\.then\(n\.bind\(n,\s*(\d+)\)\)")
            .expect("valid createPromise pattern");
}

/// 로드해야 할 청크와 그 뒤 실행할 모듈
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyTarget {
    pub chunks: Vec<String>,
    pub module: ModuleId,
}

/// 모듈 소스에서 지연 로드 대상을 추출하는 패턴
pub trait ChunkPattern: Send + Sync {
    fn targets(&self, source: &str) -> Vec<LazyTarget>;
}

// ============================================================================
// BundlerChunkPattern
// ============================================================================

/// 기본 번들러 출력 패턴
#[derive(Debug, Default, Clone, Copy)]
pub struct BundlerChunkPattern;

impl BundlerChunkPattern {
    pub fn new() -> Self {
        Self
    }
}

fn chunk_ids(text: &str) -> Vec<String> {
    CHUNK_ID
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

impl ChunkPattern for BundlerChunkPattern {
    fn targets(&self, source: &str) -> Vec<LazyTarget> {
        let mut targets = Vec::new();

        for caps in CREATE_PROMISE.captures_iter(source) {
            let Ok(module) = caps[2].parse::<u64>() else {
                continue;
            };
            targets.push(LazyTarget {
                chunks: chunk_ids(&caps[1]),
                module: ModuleId::Num(module),
            });
        }

        let all_chunks = chunk_ids(source);
        for caps in FINAL_MODULE_ID.captures_iter(source) {
            let Ok(module) = caps[1].parse::<u64>() else {
                continue;
            };
            let target = LazyTarget {
                chunks: all_chunks.clone(),
                module: ModuleId::Num(module),
            };
            if !targets.contains(&target) {
                targets.push(target);
            }
        }

        targets
    }
}

// ============================================================================
// ModuleResolver::force_load
// ============================================================================

impl ModuleResolver {
    /// 모듈 소스에 참조된 지연 모듈을 모두 로드
    ///
    /// 소스가 없거나 패턴이 없으면 빈 목록을 반환합니다.
    pub async fn force_load(&self, id: &ModuleId) -> Result<Vec<HostValue>> {
        let Some(source) = self.registry.factory_source(id) else {
            debug!("Module {} has no factory source", id);
            return Ok(Vec::new());
        };

        let targets = self.chunk_pattern.targets(&source);
        let mut loaded = Vec::with_capacity(targets.len());

        for target in targets {
            try_join_all(target.chunks.iter().map(|chunk| self.registry.load_chunk(chunk))).await?;

            match self.registry.require(&target.module) {
                Some(exports) => loaded.push(exports),
                None => warn!("Lazy module {} was not defined by its chunks", target.module),
            }
        }

        debug!("Force-loaded {} modules from {}", loaded.len(), id);
        Ok(loaded)
    }
}
