//! Toast - 사용자 알림 싱크
//!
//! 매니저는 알림 렌더링을 모르고 `Notifier` 로만 결과를 보고합니다.
//! - 토스트: 짧게 보이는 메시지 (종류 + 표시 시간)
//! - 알림: 제목, 본문, 액션 버튼이 있는 지속 알림 (업데이트 안내 등)

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

// ============================================================================
// Toast / Notification
// ============================================================================

/// 알림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Info,
    Success,
    Warning,
    Error,
}

/// 짧은 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    /// 없으면 싱크 기본값
    pub timeout: Option<Duration>,
}

impl Toast {
    pub fn new(kind: ToastKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            timeout: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ToastKind::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ToastKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ToastKind::Error, message)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// 알림 액션 버튼
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub id: String,
    pub label: String,
}

/// 지속 알림
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub body: Vec<String>,
    pub kind: ToastKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// 없으면 사용자가 닫을 때까지 유지
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}

// ============================================================================
// Notifier trait
// ============================================================================

/// 알림 싱크
pub trait Notifier: Send + Sync {
    fn toast(&self, toast: Toast);

    fn notify(&self, notification: Notification);
}

/// tracing 으로만 출력하는 싱크 (CLI 용)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn toast(&self, toast: Toast) {
        match toast.kind {
            ToastKind::Error => error!("{}", toast.message),
            ToastKind::Warning => warn!("{}", toast.message),
            ToastKind::Info | ToastKind::Success => info!("{}", toast.message),
        }
    }

    fn notify(&self, notification: Notification) {
        info!("[{}] {}", notification.title, notification.body.join(" "));
        for action in &notification.actions {
            info!("  action available: {} ({})", action.label, action.id);
        }
    }
}

// ============================================================================
// NotificationCenter
// ============================================================================

/// 지속 알림 목록 (id 당 하나)
#[derive(Debug, Default)]
pub struct NotificationCenter {
    notifications: RwLock<Vec<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 추가 (같은 id 가 있으면 교체)
    pub fn add(&self, notification: Notification) {
        let mut list = self.notifications.write();
        match list.iter_mut().find(|n| n.id == notification.id) {
            Some(existing) => *existing = notification,
            None => list.push(notification),
        }
    }

    pub fn remove(&self, id: &str) {
        self.notifications.write().retain(|n| n.id != id);
    }

    pub fn set(&self, notifications: Vec<Notification>) {
        *self.notifications.write() = notifications;
    }

    pub fn list(&self) -> Vec<Notification> {
        self.notifications.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Notification> {
        self.notifications.read().iter().find(|n| n.id == id).cloned()
    }
}

impl Notifier for NotificationCenter {
    fn toast(&self, toast: Toast) {
        LogNotifier.toast(toast);
    }

    fn notify(&self, notification: Notification) {
        self.add(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(id: &str, title: &str) -> Notification {
        Notification {
            id: id.to_string(),
            title: title.to_string(),
            body: vec![],
            kind: ToastKind::Info,
            icon: None,
            duration: None,
            actions: vec![],
        }
    }

    #[test]
    fn test_center_replaces_same_id() {
        let center = NotificationCenter::new();
        center.add(notification("plugin-updates", "first"));
        center.add(notification("other", "x"));
        center.add(notification("plugin-updates", "second"));

        let list = center.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "second");

        center.remove("plugin-updates");
        assert!(center.get("plugin-updates").is_none());
    }

    #[test]
    fn test_toast_builders() {
        let toast = Toast::error("boom").with_timeout(Duration::from_secs(5));
        assert_eq!(toast.kind, ToastKind::Error);
        assert_eq!(toast.timeout, Some(Duration::from_secs(5)));
    }
}
