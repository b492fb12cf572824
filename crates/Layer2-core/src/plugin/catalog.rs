//! Plugin Catalog - 원격 스토어 목록과 업데이트
//!
//! 스토어 목록을 파일 이름으로 색인하고, 설치된 버전과 semver 로 비교해
//! 업데이트 알림을 띄웁니다. 적용은 플러그인마다 독립적으로 동시에 진행됩니다.

use async_trait::async_trait;
use bridge_foundation::{Error, Result, DEFAULT_STORE_URL};
use futures::future::join_all;
use parking_lot::RwLock;
use reqwest::Client;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::files::PluginFile;
use super::manager::{PluginManager, SharedManager};
use crate::toast::{Notification, NotificationAction, Notifier, Toast, ToastKind};

/// 업데이트 알림 id (같은 id 는 교체됨)
pub const UPDATE_NOTIFICATION_ID: &str = "plugin-updates";

/// "Update All!" 액션 id
pub const UPDATE_ALL_ACTION: &str = "update-all";

const ERROR_TIMEOUT: Duration = Duration::from_millis(5000);

// ============================================================================
// 스토어 데이터
// ============================================================================

/// 스토어 작성자
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogAuthor {
    pub github_id: String,
    pub github_name: String,
    pub display_name: String,
    pub discord_name: String,
    pub discord_avatar_hash: Option<String>,
    pub discord_snowflake: String,
}

/// 스토어 항목
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogEntry {
    pub id: u64,
    pub name: String,
    pub file_name: String,
    pub description: String,
    pub version: String,
    pub author: CatalogAuthor,
    pub likes: u64,
    pub downloads: u64,
    pub tags: Vec<String>,
    pub thumbnail_url: Option<String>,
    pub latest_source_url: String,
    pub initial_release_date: Option<String>,
    pub latest_release_date: Option<String>,
}

/// `{ plugins: [...] }` 또는 배열
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogResponse {
    Wrapped { plugins: Vec<CatalogEntry> },
    List(Vec<CatalogEntry>),
}

impl CatalogResponse {
    fn into_entries(self) -> Vec<CatalogEntry> {
        match self {
            CatalogResponse::Wrapped { plugins } => plugins,
            CatalogResponse::List(plugins) => plugins,
        }
    }
}

/// 설치된 버전보다 새 버전이 있는 플러그인
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableUpdate {
    pub filename: String,
    pub name: String,
    pub installed: String,
    pub latest: String,
}

/// 일괄 업데이트 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

// ============================================================================
// CatalogSource
// ============================================================================

/// 스토어 HTTP 경계
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// 스토어 목록
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>>;

    /// 플러그인 소스 (캐시 없이)
    async fn fetch_source(&self, url: &str) -> Result<String>;
}

/// reqwest 구현
pub struct HttpCatalogSource {
    client: Client,
    url: String,
}

impl Default for HttpCatalogSource {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_URL)
    }
}

impl HttpCatalogSource {
    pub fn new(url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("AddonBridge")
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>> {
        debug!("Fetching plugin store from {}", self.url);

        let response = self.client.get(&self.url).send().await.map_err(Error::network)?;
        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "Failed to fetch plugin store: HTTP {}",
                response.status()
            )));
        }

        let body: CatalogResponse = response.json().await.map_err(Error::network)?;
        Ok(body.into_entries())
    }

    async fn fetch_source(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .send()
            .await
            .map_err(Error::network)?;

        if !response.status().is_success() {
            return Err(Error::Network(format!("HTTP {} for {}", response.status(), url)));
        }

        response.text().await.map_err(Error::network)
    }
}

// ============================================================================
// PluginCatalog
// ============================================================================

/// 스토어 목록과 업데이트 확인
pub struct PluginCatalog {
    source: Arc<dyn CatalogSource>,
    notifier: Arc<dyn Notifier>,
    /// file_name → 항목
    entries: RwLock<HashMap<String, CatalogEntry>>,
}

impl PluginCatalog {
    pub fn new(source: Arc<dyn CatalogSource>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            source,
            notifier,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// 기본 스토어 URL 의 HTTP 카탈로그
    pub fn http(url: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(Arc::new(HttpCatalogSource::new(url)), notifier)
    }

    pub fn entry(&self, file_name: &str) -> Option<CatalogEntry> {
        self.entries.read().get(file_name).cloned()
    }

    /// 이름순 전체 항목
    pub fn entries(&self) -> Vec<CatalogEntry> {
        let mut entries: Vec<_> = self.entries.read().values().cloned().collect();
        entries.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// 스토어 목록 다시 받기
    ///
    /// 실패하면 에러 토스트를 띄우고 이번 주기는 포기합니다.
    pub async fn refresh(&self) -> Result<usize> {
        match self.source.fetch_catalog().await {
            Ok(plugins) => {
                info!("Fetched {} plugins from store", plugins.len());
                let mut entries = self.entries.write();
                entries.clear();
                for plugin in plugins {
                    entries.insert(plugin.file_name.clone(), plugin);
                }
                Ok(entries.len())
            }
            Err(e) => {
                error!("Failed to fetch plugin list: {}", e);
                self.notifier.toast(
                    Toast::error("Failed to get BetterDiscord plugin updates").with_timeout(ERROR_TIMEOUT),
                );
                Err(e)
            }
        }
    }

    /// 설치된 플러그인과 스토어 버전 비교
    ///
    /// 어느 쪽이든 semver 가 아니면 그 플러그인만 건너뜁니다.
    pub fn check_updates(&self, manager: &PluginManager) -> Vec<AvailableUpdate> {
        let entries = self.entries.read();
        let mut updates = Vec::new();

        for plugin in manager.plugins() {
            let Some(entry) = entries.get(plugin.filename()) else {
                continue;
            };

            let installed = &plugin.meta().version;
            let (Ok(current), Ok(latest)) = (Version::parse(installed), Version::parse(&entry.version)) else {
                debug!(
                    "Skipping update check for {}: {} / {} is not semver",
                    plugin.filename(),
                    installed,
                    entry.version
                );
                continue;
            };

            if latest > current {
                updates.push(AvailableUpdate {
                    filename: plugin.filename().to_string(),
                    name: entry.name.clone(),
                    installed: installed.clone(),
                    latest: entry.version.clone(),
                });
            }
        }

        updates
    }

    /// 업데이트 알림 (없으면 아무것도 안 함)
    pub fn notify_updates(&self, updates: &[AvailableUpdate]) {
        if updates.is_empty() {
            return;
        }

        let message = if updates.len() == 1 {
            "One plugin has an update!".to_string()
        } else {
            format!("{} plugins have updates!", updates.len())
        };

        let mut body = vec![message];
        body.extend(updates.iter().map(|u| format!("{} ({})", u.name, u.latest)));

        self.notifier.notify(Notification {
            id: UPDATE_NOTIFICATION_ID.to_string(),
            title: "BetterDiscord Plugin Updater".to_string(),
            body,
            kind: ToastKind::Info,
            icon: Some("bd-logo".to_string()),
            duration: None,
            actions: vec![NotificationAction {
                id: UPDATE_ALL_ACTION.to_string(),
                label: "Update All!".to_string(),
            }],
        });
    }

    /// 목록 갱신 → 매니저 준비 대기 → 비교 → 알림
    pub async fn run_update_check(&self, shared: &SharedManager) -> Result<Vec<AvailableUpdate>> {
        self.refresh().await?;

        let mut ready = shared.lock().ready_signal();
        ready
            .wait_for(|ready| *ready)
            .await
            .map_err(|_| Error::Internal("Plugin manager dropped before ready".to_string()))?;

        let updates = self.check_updates(&shared.lock());
        info!("{} plugin updates available", updates.len());
        self.notify_updates(&updates);
        Ok(updates)
    }

    /// 여러 플러그인을 동시에 업데이트
    pub async fn apply_updates(&self, shared: &SharedManager, filenames: &[String]) -> UpdateReport {
        let results = join_all(filenames.iter().map(|f| self.apply_update(shared, f))).await;

        let mut report = UpdateReport::default();
        for (filename, result) in filenames.iter().zip(results) {
            match result {
                Ok(true) => report.updated.push(filename.clone()),
                Ok(false) => {}
                Err(_) => report.failed.push(filename.clone()),
            }
        }

        if !report.updated.is_empty() {
            let count = report.updated.len();
            self.notifier.toast(Toast::success(format!(
                "Updated {} {}",
                count,
                if count == 1 { "plugin" } else { "plugins" }
            )));
        }

        report
    }

    /// 하나 업데이트 (실패 시 에러 토스트)
    async fn apply_update(&self, shared: &SharedManager, filename: &str) -> Result<bool> {
        let Some(entry) = self.entry(filename) else {
            return Ok(false);
        };

        let result = self.fetch_and_apply(shared, &entry).await;
        match &result {
            Ok(true) => info!("Updated plugin {} to version {}", entry.name, entry.version),
            Ok(false) => debug!("{} is already up to date", filename),
            Err(e) => {
                error!("Failed to update plugin {}: {}", filename, e);
                self.notifier.toast(
                    Toast::error(format!("Failed to update plugin {}", entry.name)).with_timeout(ERROR_TIMEOUT),
                );
            }
        }
        result
    }

    async fn fetch_and_apply(&self, shared: &SharedManager, entry: &CatalogEntry) -> Result<bool> {
        let code = self.source.fetch_source(&entry.latest_source_url).await?;

        let mut manager = shared.lock();
        if manager.get(&entry.file_name).is_none() {
            return Ok(false);
        }
        manager.update_plugin_quiet(&entry.file_name, PluginFile::new(&entry.file_name, code), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::files::MemoryAddonFiles;
    use crate::testing::{plugin_source, RecordingNotifier, ScriptedEngine};
    use bridge_foundation::MemoryEnabledStore;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakeSource {
        entries: Vec<CatalogEntry>,
        sources: HashMap<String, String>,
        fail_catalog: bool,
        fetched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CatalogSource for FakeSource {
        async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>> {
            if self.fail_catalog {
                return Err(Error::network("connection refused"));
            }
            Ok(self.entries.clone())
        }

        async fn fetch_source(&self, url: &str) -> Result<String> {
            self.fetched.lock().push(url.to_string());
            self.sources
                .get(url)
                .cloned()
                .ok_or_else(|| Error::Network(format!("HTTP 404 for {}", url)))
        }
    }

    fn entry(name: &str, version: &str) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            file_name: format!("{}.plugin.js", name),
            version: version.to_string(),
            latest_source_url: format!("https://store.test/{}.plugin.js", name),
            ..Default::default()
        }
    }

    fn installed(name: &str, version: &str) -> PluginFile {
        PluginFile::new(format!("{}.plugin.js", name), plugin_source(name, version, "start(){} stop(){}"))
    }

    fn manager(files: Vec<PluginFile>, notifier: Arc<RecordingNotifier>) -> (SharedManager, Arc<MemoryAddonFiles>) {
        let store = Arc::new(MemoryAddonFiles::with_files(files.clone()));
        let mut manager = PluginManager::new(
            Arc::new(ScriptedEngine::default()),
            store.clone(),
            Arc::new(MemoryEnabledStore::new()),
            notifier,
        );
        manager.load_all(files);
        (manager.into_shared(), store)
    }

    #[test]
    fn test_response_shapes() {
        let wrapped: CatalogResponse =
            serde_json::from_str(r#"{"plugins":[{"name":"A","file_name":"A.plugin.js","version":"1.0.0"}]}"#)
                .unwrap();
        let list: CatalogResponse = serde_json::from_str(
            r#"[{"id":7,"name":"B","file_name":"B.plugin.js","version":"2.0.0","author":{"display_name":"me"},"tags":["x"]}]"#,
        )
        .unwrap();

        assert_eq!(wrapped.into_entries()[0].file_name, "A.plugin.js");
        let b = list.into_entries().remove(0);
        assert_eq!(b.id, 7);
        assert_eq!(b.author.display_name, "me");
        assert_eq!(b.tags, vec!["x"]);
    }

    #[tokio::test]
    async fn test_check_updates_skips_invalid_versions() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (shared, _) = manager(
            vec![
                installed("Bad", "???"),
                installed("Newer", "1.0.0"),
                installed("Same", "1.0.0"),
                installed("Local", "1.0.0"),
            ],
            notifier.clone(),
        );
        let source = FakeSource {
            entries: vec![entry("Bad", "2.0.0"), entry("Newer", "1.2.0"), entry("Same", "1.0.0")],
            ..Default::default()
        };
        let catalog = PluginCatalog::new(Arc::new(source), notifier.clone());
        catalog.refresh().await.unwrap();

        let updates = catalog.check_updates(&shared.lock());

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].filename, "Newer.plugin.js");
        assert_eq!(updates[0].latest, "1.2.0");
    }

    #[tokio::test]
    async fn test_refresh_failure_toast() {
        let notifier = Arc::new(RecordingNotifier::default());
        let source = FakeSource {
            fail_catalog: true,
            ..Default::default()
        };
        let catalog = PluginCatalog::new(Arc::new(source), notifier.clone());

        assert!(matches!(catalog.refresh().await, Err(Error::Network(_))));
        let toasts = notifier.toasts.lock().clone();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].message, "Failed to get BetterDiscord plugin updates");
        assert_eq!(toasts[0].timeout, Some(Duration::from_millis(5000)));
    }

    #[tokio::test]
    async fn test_run_update_check_waits_for_ready() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (shared, _) = manager(
            vec![installed("Alpha", "1.0.0"), installed("Beta", "0.9.0")],
            notifier.clone(),
        );
        let source = FakeSource {
            entries: vec![entry("Alpha", "1.1.0"), entry("Beta", "1.0.0")],
            ..Default::default()
        };
        let catalog = Arc::new(PluginCatalog::new(Arc::new(source), notifier.clone()));

        let task = {
            let catalog = catalog.clone();
            let shared = shared.clone();
            tokio::spawn(async move { catalog.run_update_check(&shared).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        shared.lock().mark_ready();
        let updates = task.await.unwrap().unwrap();

        assert_eq!(updates.len(), 2);
        let notifications = notifier.notifications.lock().clone();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].id, UPDATE_NOTIFICATION_ID);
        assert_eq!(notifications[0].body[0], "2 plugins have updates!");
        assert_eq!(notifications[0].actions[0].label, "Update All!");
    }

    #[tokio::test]
    async fn test_apply_updates() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (shared, store) = manager(
            vec![installed("Alpha", "1.0.0"), installed("Beta", "1.0.0")],
            notifier.clone(),
        );
        let mut sources = HashMap::new();
        sources.insert(
            "https://store.test/Alpha.plugin.js".to_string(),
            plugin_source("Alpha", "1.1.0", "start(){} stop(){}"),
        );
        let source = FakeSource {
            entries: vec![entry("Alpha", "1.1.0"), entry("Beta", "1.1.0")],
            sources,
            ..Default::default()
        };
        let catalog = PluginCatalog::new(Arc::new(source), notifier.clone());
        catalog.refresh().await.unwrap();
        notifier.clear();

        let report = catalog
            .apply_updates(&shared, &["Alpha.plugin.js".to_string(), "Beta.plugin.js".to_string()])
            .await;

        assert_eq!(report.updated, vec!["Alpha.plugin.js"]);
        assert_eq!(report.failed, vec!["Beta.plugin.js"]);
        assert_eq!(shared.lock().get("Alpha").unwrap().meta().version, "1.1.0");
        assert!(store.content("Alpha.plugin.js").unwrap().contains("1.1.0"));
        assert_eq!(
            notifier.messages(),
            vec!["Failed to update plugin Beta", "Updated 1 plugin"]
        );
    }
}
