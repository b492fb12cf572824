//! Mutation Hub - 공유 DOM 변경 감시자
//!
//! 감시자는 프로세스 전체에서 한 번만 설치됩니다 (`ensure_started`).
//! 관찰된 변경은 채널로 전달되고, 매니저가 `observer` 메서드를 가진
//! 실행 중 인스턴스에 나눠줍니다.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::host::HostValue;

/// 변경 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

impl MutationKind {
    fn as_str(&self) -> &'static str {
        match self {
            MutationKind::ChildList => "childList",
            MutationKind::Attributes => "attributes",
            MutationKind::CharacterData => "characterData",
        }
    }
}

/// DOM 변경 기록
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub kind: MutationKind,
    /// 대상 노드 식별자
    pub target: String,
    pub added_nodes: Vec<String>,
    pub removed_nodes: Vec<String>,
    pub attribute_name: Option<String>,
}

impl Mutation {
    pub fn child_list(target: impl Into<String>, added: Vec<String>, removed: Vec<String>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target: target.into(),
            added_nodes: added,
            removed_nodes: removed,
            attribute_name: None,
        }
    }

    /// 플러그인에 넘기는 값
    pub fn to_value(&self) -> HostValue {
        let list = |nodes: &[String]| {
            HostValue::object(
                nodes
                    .iter()
                    .enumerate()
                    .map(|(i, n)| (i.to_string(), HostValue::string(n))),
            )
        };
        HostValue::object([
            ("type", HostValue::string(self.kind.as_str())),
            ("target", HostValue::string(&self.target)),
            ("addedNodes", list(&self.added_nodes)),
            ("removedNodes", list(&self.removed_nodes)),
            (
                "attributeName",
                self.attribute_name
                    .as_deref()
                    .map(HostValue::string)
                    .unwrap_or(HostValue::Null),
            ),
        ])
    }
}

/// 호스트의 DOM 변경 공급원
pub trait MutationSource: Send + Sync {
    /// 변경 배치를 `sink` 로 보내기 시작 (한 번만 호출됨)
    fn observe(&self, sink: mpsc::UnboundedSender<Vec<Mutation>>);
}

// ============================================================================
// MutationHub
// ============================================================================

/// 한 번만 설치되는 감시자
pub struct MutationHub {
    source: Option<Arc<dyn MutationSource>>,
    sender: mpsc::UnboundedSender<Vec<Mutation>>,
    receiver: Option<mpsc::UnboundedReceiver<Vec<Mutation>>>,
    started: bool,
}

impl Default for MutationHub {
    fn default() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            source: None,
            sender,
            receiver: Some(receiver),
            started: false,
        }
    }
}

impl MutationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Arc<dyn MutationSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// 감시자 설치 (이미 설치되었으면 무시)
    pub fn ensure_started(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        match &self.source {
            Some(source) => {
                info!("Installing shared mutation observer");
                source.observe(self.sender.clone());
            }
            None => debug!("No mutation source configured"),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// 변경 배치 수신기 (한 번만 가져갈 수 있음)
    pub fn take_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<Vec<Mutation>>> {
        self.receiver.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        installs: AtomicUsize,
    }

    impl MutationSource for CountingSource {
        fn observe(&self, sink: mpsc::UnboundedSender<Vec<Mutation>>) {
            self.installs.fetch_add(1, Ordering::SeqCst);
            let _ = sink.send(vec![Mutation::child_list("body", vec!["div".into()], vec![])]);
        }
    }

    #[test]
    fn test_ensure_started_installs_once() {
        let source = Arc::new(CountingSource::default());
        let mut hub = MutationHub::new().with_source(source.clone());
        let mut rx = hub.take_receiver().unwrap();

        hub.ensure_started();
        hub.ensure_started();

        assert_eq!(source.installs.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv().unwrap().len(), 1);
        assert!(hub.take_receiver().is_none());
    }

    #[test]
    fn test_mutation_value_shape() {
        let value = Mutation::child_list("app", vec!["a".into(), "b".into()], vec![]).to_value();
        assert_eq!(value.get("type").and_then(HostValue::as_str), Some("childList"));
        assert_eq!(value.get_path(&["addedNodes", "1"]).and_then(HostValue::as_str), Some("b"));
        assert_eq!(value.get("attributeName"), Some(&HostValue::Null));
    }
}
