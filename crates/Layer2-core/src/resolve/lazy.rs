//! Lazy Search - 아직 등록되지 않은 모듈을 기다리는 비동기 탐색
//!
//! 캐시 → 기존 모듈 → 등록 알림 순서로 확인합니다. 취소 토큰이 먼저
//! 발동하면 구독을 해제하고 `fatal` 여부에 따라 에러 또는 `None` 을 반환합니다.

use bridge_foundation::{Error, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::filters::Filter;
use super::search::{test_module, ModuleResolver, SearchOptions};
use crate::host::HostValue;

/// 비동기 탐색 옵션
#[derive(Debug, Clone, Default)]
pub struct LazyOptions {
    pub search: SearchOptions,
    /// 취소 신호
    pub signal: Option<CancellationToken>,
    /// 취소 시 에러로 끝낼지 여부
    pub fatal: bool,
}

impl LazyOptions {
    pub fn new(search: SearchOptions) -> Self {
        Self {
            search,
            ..Default::default()
        }
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn fatal(mut self, fatal: bool) -> Self {
        self.fatal = fatal;
        self
    }

    fn aborted(&self) -> Result<Option<HostValue>> {
        if self.fatal {
            Err(Error::Aborted)
        } else {
            Ok(None)
        }
    }
}

impl ModuleResolver {
    /// 일치하는 모듈이 등록될 때까지 대기
    pub async fn get_lazy(&self, filter: &Filter, options: LazyOptions) -> Result<Option<HostValue>> {
        let signal = options.signal.clone().unwrap_or_default();
        if signal.is_cancelled() {
            return options.aborted();
        }

        if let Some(cached) = self.cached(&options.search) {
            return Ok(Some(cached));
        }

        // 기존 모듈 검사 전에 구독해야 사이에 등록된 모듈을 놓치지 않음
        let mut registrations = self.registry.subscribe();
        if let Some(found) = self.get(filter, &options.search) {
            return Ok(Some(found));
        }

        debug!("Waiting for module matching {}", filter.label());
        loop {
            tokio::select! {
                biased;

                _ = signal.cancelled() => {
                    debug!("Lazy search for {} aborted", filter.label());
                    return options.aborted();
                }
                received = registrations.recv() => match received {
                    Ok(module) => {
                        if let Some(found) = test_module(filter, &module, &options.search) {
                            self.remember(&options.search, &found.value);
                            return Ok(Some(found.value));
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Lazy search for {} skipped {} registrations", filter.label(), skipped);
                        if let Some(found) = self.get(filter, &options.search) {
                            return Ok(Some(found));
                        }
                    }
                    Err(RecvError::Closed) => return Ok(None),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryRegistry, ModuleId};
    use crate::resolve::filters::by_keys;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (Arc<MemoryRegistry>, ModuleResolver) {
        let registry = Arc::new(MemoryRegistry::new());
        let resolver = ModuleResolver::new(registry.clone());
        (registry, resolver)
    }

    #[tokio::test]
    async fn test_aborted_fatal_rejects_without_subscribing() {
        let (registry, resolver) = setup();
        let signal = CancellationToken::new();
        signal.cancel();

        let options = LazyOptions::default().with_signal(signal).fatal(true);
        let result = resolver.get_lazy(&by_keys(&["x"]), options).await;

        assert!(matches!(result, Err(Error::Aborted)));
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_aborted_non_fatal_resolves_none() {
        let (registry, resolver) = setup();
        let signal = CancellationToken::new();
        signal.cancel();

        let options = LazyOptions::default().with_signal(signal);
        let result = resolver.get_lazy(&by_keys(&["x"]), options).await;

        assert!(matches!(result, Ok(None)));
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_resolves_existing_module() {
        let (registry, resolver) = setup();
        let value = HostValue::object([("x", HostValue::from(1.0))]);
        registry.define(ModuleId::Num(1), value.clone());

        let found = resolver.get_lazy(&by_keys(&["x"]), LazyOptions::default()).await.unwrap();
        assert_eq!(found, Some(value));
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_waits_for_registration() {
        let (registry, resolver) = setup();
        let resolver = Arc::new(resolver);
        let value = HostValue::object([("createPortal", HostValue::function("f"))]);

        let waiter = {
            let resolver = resolver.clone();
            tokio::spawn(async move {
                let options = LazyOptions::new(SearchOptions::new().cache_id("portal"));
                resolver.get_lazy(&by_keys(&["createPortal"]), options).await
            })
        };

        while registry.subscriber_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        registry.define(ModuleId::Num(2), HostValue::from("noise"));
        registry.define(ModuleId::Num(165737), value.clone());

        let found = waiter.await.unwrap().unwrap();
        assert_eq!(found, Some(value.clone()));
        assert_eq!(resolver.cache().get("portal"), Some(value));
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_unsubscribes() {
        let (registry, resolver) = setup();
        let resolver = Arc::new(resolver);
        let signal = CancellationToken::new();

        let waiter = {
            let resolver = resolver.clone();
            let options = LazyOptions::default().with_signal(signal.clone()).fatal(true);
            tokio::spawn(async move { resolver.get_lazy(&by_keys(&["never"]), options).await })
        };

        while registry.subscriber_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        signal.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(Error::Aborted)));
        assert_eq!(registry.subscriber_count(), 0);
    }
}
