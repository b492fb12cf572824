//! Addon Events - 애드온 목록 변경 알림
//!
//! 매니저의 모든 변경(추가/삭제/업데이트/활성화)은 여기로 발행됩니다.
//! 설정 화면 같은 소비자는 구독해서 목록을 다시 그립니다.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

// ============================================================================
// AddonEvent - 이벤트 타입
// ============================================================================

/// 애드온 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonEvent {
    /// 이벤트 타입
    pub kind: EventKind,

    /// 대상 플러그인 id (목록 전체 변경이면 없음)
    pub plugin_id: Option<String>,

    /// 타임스탬프
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl AddonEvent {
    /// 플러그인 이벤트 생성
    pub fn new(kind: EventKind, plugin_id: impl Into<String>) -> Self {
        Self {
            kind,
            plugin_id: Some(plugin_id.into()),
            timestamp: chrono::Utc::now(),
        }
    }

    /// 목록 전체 이벤트 생성
    pub fn list(kind: EventKind) -> Self {
        Self {
            kind,
            plugin_id: None,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// 이벤트 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    // 목록 이벤트
    Loaded,
    Added,
    Removed,
    Updated,

    // 상태 이벤트
    Started,
    Stopped,
    Enabled,
    Disabled,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
            Self::Updated => write!(f, "updated"),
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

// ============================================================================
// AddonEventHandler - 동기 핸들러
// ============================================================================

/// 이벤트 핸들러 트레이트
///
/// 매니저 잠금 안에서 호출되므로 매니저를 다시 잠그면 안 됩니다.
pub trait AddonEventHandler: Send + Sync {
    /// 핸들러 이름
    fn name(&self) -> &str;

    /// 관심 있는 이벤트 타입들
    fn interested_events(&self) -> Vec<EventKind>;

    /// 이벤트 처리
    fn handle(&self, event: &AddonEvent);
}

// ============================================================================
// EventBus - 이벤트 버스 (발행/구독)
// ============================================================================

/// 이벤트 버스
pub struct EventBus {
    sender: broadcast::Sender<AddonEvent>,
    handlers: RwLock<HashMap<String, Arc<dyn AddonEventHandler>>>,
    /// 최근 이벤트
    history: RwLock<Vec<AddonEvent>>,
    history_size: usize,
}

impl EventBus {
    /// 새 이벤트 버스 생성
    pub fn new() -> Self {
        Self::with_capacity(256, 100)
    }

    /// 용량 지정하여 생성
    pub fn with_capacity(channel_capacity: usize, history_size: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity);
        Self {
            sender,
            handlers: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::with_capacity(history_size)),
            history_size,
        }
    }

    /// 핸들러 등록
    pub fn register_handler(&self, handler: Arc<dyn AddonEventHandler>) {
        self.handlers.write().insert(handler.name().to_string(), handler);
    }

    /// 핸들러 제거
    pub fn unregister_handler(&self, name: &str) {
        self.handlers.write().remove(name);
    }

    /// 이벤트 발행
    pub fn publish(&self, event: AddonEvent) {
        debug!("Addon event: {} {:?}", event.kind, event.plugin_id);

        {
            let mut history = self.history.write();
            if history.len() >= self.history_size {
                history.remove(0);
            }
            history.push(event.clone());
        }

        // 구독자가 없어도 OK
        let _ = self.sender.send(event.clone());

        let handlers: Vec<_> = self.handlers.read().values().cloned().collect();
        for handler in handlers {
            if handler.interested_events().contains(&event.kind) {
                handler.handle(&event);
            }
        }
    }

    /// 이벤트 구독
    pub fn subscribe(&self) -> broadcast::Receiver<AddonEvent> {
        self.sender.subscribe()
    }

    /// 이벤트 히스토리
    pub fn history(&self) -> Vec<AddonEvent> {
        self.history.read().clone()
    }

    /// 특정 타입의 히스토리
    pub fn history_by_kind(&self, kind: EventKind) -> Vec<AddonEvent> {
        self.history
            .read()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.history.write().clear();
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        seen: AtomicUsize,
    }

    impl AddonEventHandler for CountingHandler {
        fn name(&self) -> &str {
            "counting"
        }

        fn interested_events(&self) -> Vec<EventKind> {
            vec![EventKind::Removed]
        }

        fn handle(&self, _event: &AddonEvent) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_handler_filtering() {
        let bus = EventBus::new();
        let handler = Arc::new(CountingHandler {
            seen: AtomicUsize::new(0),
        });
        bus.register_handler(handler.clone());

        bus.publish(AddonEvent::new(EventKind::Added, "A"));
        bus.publish(AddonEvent::new(EventKind::Removed, "A"));

        assert_eq!(handler.seen.load(Ordering::SeqCst), 1);
        assert_eq!(bus.history().len(), 2);
        assert_eq!(bus.history_by_kind(EventKind::Added).len(), 1);
    }

    #[test]
    fn test_history_bounded() {
        let bus = EventBus::with_capacity(8, 2);
        for kind in [EventKind::Added, EventKind::Started, EventKind::Stopped] {
            bus.publish(AddonEvent::list(kind));
        }
        let kinds: Vec<_> = bus.history().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Started, EventKind::Stopped]);
    }

    #[tokio::test]
    async fn test_subscribe() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.publish(AddonEvent::new(EventKind::Enabled, "Foo"));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Enabled);
        assert_eq!(event.plugin_id.as_deref(), Some("Foo"));
    }
}
