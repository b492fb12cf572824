//! 서브커맨드 구현
//!
//! 모든 명령은 헤더만 읽는 인벤토리 매니저를 씁니다. 활성화 플래그는
//! settings.json 에서 직접 읽고 씁니다.

use anyhow::{bail, Context as _, Result};
use bridge_core::plugin::{AvailableUpdate, EventKind, FsAddonFiles, PluginCatalog};
use bridge_core::{LogNotifier, PluginManager, PluginManagerConfig, PluginSummary, SharedManager};
use bridge_foundation::{BridgeConfig, EnabledStore, JsonEnabledStore, JsonStore, MemoryEnabledStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::engine::InertEngine;

// ============================================================================
// Context
// ============================================================================

/// 명령 실행 환경
pub struct Context {
    pub config: BridgeConfig,
    pub plugins_dir: PathBuf,
    pub enabled: Arc<JsonEnabledStore>,
}

impl Context {
    /// 글로벌 설정 + 명령줄 덮어쓰기
    pub fn load(plugins_dir: Option<PathBuf>, store_url: Option<String>) -> Result<Self> {
        let mut config = BridgeConfig::load().context("Failed to load bridge.json")?;
        if let Some(dir) = plugins_dir {
            config.plugins_dir = Some(dir);
        }
        if let Some(url) = store_url {
            config.store_url = url;
        }
        Self::from_config(config)
    }

    pub fn from_config(config: BridgeConfig) -> Result<Self> {
        let plugins_dir = config.ensure_plugins_dir()?;
        let enabled = JsonEnabledStore::open(JsonStore::new(config.data_dir()?))?;
        Ok(Self {
            config,
            plugins_dir,
            enabled: Arc::new(enabled),
        })
    }

    /// 헤더만 로드한 매니저 (아무것도 시작하지 않음)
    pub async fn inventory(&self) -> Result<SharedManager> {
        let manager = PluginManager::with_config(
            Arc::new(InertEngine),
            Arc::new(FsAddonFiles::new(&self.plugins_dir)),
            Arc::new(MemoryEnabledStore::new()),
            Arc::new(LogNotifier),
            PluginManagerConfig::from_bridge(&self.config),
        )
        .into_shared();

        let report = PluginManager::initialize(&manager).await?;
        if report.skipped > 0 {
            warn!("{} files in {} were skipped", report.skipped, self.plugins_dir.display());
        }
        Ok(manager)
    }

    /// 요약 목록 (활성화 여부는 settings.json 기준)
    pub fn summaries(&self, manager: &SharedManager) -> Vec<PluginSummary> {
        manager
            .lock()
            .summaries()
            .into_iter()
            .map(|mut s| {
                s.enabled = self.enabled.is_enabled(&s.id);
                s
            })
            .collect()
    }
}

// ============================================================================
// list / info
// ============================================================================

pub async fn list(ctx: &Context, json: bool) -> Result<()> {
    let manager = ctx.inventory().await?;
    let summaries = ctx.summaries(&manager);

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No plugins found in {}", ctx.plugins_dir.display());
        return Ok(());
    }

    print!("{}", render_table(&summaries));
    Ok(())
}

pub fn render_table(summaries: &[PluginSummary]) -> String {
    let mut out = format!("{:<3} {:<28} {:<10} {:<20} {}\n", "", "Name", "Version", "Author", "File");
    out.push_str(&"-".repeat(80));
    out.push('\n');

    for s in summaries {
        out.push_str(&format!(
            "{:<3} {:<28} {:<10} {:<20} {}\n",
            if s.enabled { "✓" } else { "" },
            truncate(&s.name, 28),
            truncate(&s.version, 10),
            truncate(&s.author, 20),
            s.filename
        ));
    }
    out
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// 파싱된 헤더 출력
pub async fn info(ctx: &Context, plugin: &str) -> Result<()> {
    let manager = ctx.inventory().await?;
    let manager = manager.lock();
    let Some(found) = manager.get(plugin) else {
        bail!("No plugin named {}", plugin);
    };

    let mut meta = found.meta().clone();
    meta.file_content.clear();
    println!("{}", serde_json::to_string_pretty(&meta)?);
    println!("enabled: {}", ctx.enabled.is_enabled(&meta.id));
    Ok(())
}

// ============================================================================
// enable / disable
// ============================================================================

/// 플래그 변경 (다음 클라이언트 시작 때 반영)
pub async fn set_enabled(ctx: &Context, plugins: &[String], enabled: bool) -> Result<()> {
    let manager = ctx.inventory().await?;
    let manager = manager.lock();

    for name in plugins {
        let Some(found) = manager.get(name) else {
            bail!("No plugin named {}", name);
        };
        ctx.enabled.set_enabled(found.id(), enabled)?;
        println!(
            "{} {}",
            found.name(),
            if enabled { "enabled" } else { "disabled" }
        );
    }
    Ok(())
}

// ============================================================================
// check-updates / update
// ============================================================================

async fn available_updates(manager: &SharedManager, catalog: &PluginCatalog) -> Result<Vec<AvailableUpdate>> {
    manager.lock().mark_ready();
    Ok(catalog.run_update_check(manager).await?)
}

pub async fn check_updates(ctx: &Context) -> Result<()> {
    let manager = ctx.inventory().await?;
    let catalog = PluginCatalog::http(&ctx.config.store_url, Arc::new(LogNotifier));
    let updates = available_updates(&manager, &catalog).await?;

    if updates.is_empty() {
        println!("All plugins are up to date.");
        return Ok(());
    }
    for update in &updates {
        println!("{} {} -> {} ({})", update.name, update.installed, update.latest, update.filename);
    }
    Ok(())
}

/// 스토어 버전으로 업데이트 (이름을 안 주면 전부)
pub async fn update(ctx: &Context, plugins: &[String]) -> Result<()> {
    let manager = ctx.inventory().await?;
    let catalog = PluginCatalog::http(&ctx.config.store_url, Arc::new(LogNotifier));
    let updates = available_updates(&manager, &catalog).await?;

    let selected: Vec<String> = {
        let manager = manager.lock();
        updates
            .iter()
            .filter(|u| {
                plugins.is_empty()
                    || plugins.iter().any(|p| {
                        p == &u.filename || manager.get(p).is_some_and(|found| found.filename() == u.filename)
                    })
            })
            .map(|u| u.filename.clone())
            .collect()
    };

    if selected.is_empty() {
        println!("Nothing to update.");
        return Ok(());
    }

    let report = catalog.apply_updates(&manager, &selected).await;
    for filename in &report.updated {
        println!("updated {}", filename);
    }
    for filename in &report.failed {
        println!("failed  {}", filename);
    }
    if !report.failed.is_empty() {
        bail!("{} updates failed", report.failed.len());
    }
    Ok(())
}

// ============================================================================
// watch
// ============================================================================

/// 폴더 변경을 Ctrl+C 까지 반영하며 로그 출력
pub async fn watch(ctx: &Context) -> Result<()> {
    let manager = PluginManager::with_config(
        Arc::new(InertEngine),
        Arc::new(FsAddonFiles::new(&ctx.plugins_dir)),
        Arc::new(MemoryEnabledStore::new()),
        Arc::new(LogNotifier),
        PluginManagerConfig::from_bridge(&ctx.config),
    )
    .into_shared();

    let mut events = manager.lock().event_bus().subscribe();
    let handles = bridge_core::bootstrap(&manager, &ctx.config.watch).await?;
    info!("Watching {}", ctx.plugins_dir.display());

    if ctx.config.check_updates {
        let catalog = PluginCatalog::http(&ctx.config.store_url, Arc::new(LogNotifier));
        if let Err(e) = catalog.run_update_check(&manager).await {
            warn!("Update check failed: {}", e);
        }
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Loaded) {
                        continue;
                    }
                    let id = event.plugin_id.as_deref().unwrap_or("-");
                    info!("{} {}", event.kind, id);
                }
                Err(RecvError::Lagged(n)) => warn!("Missed {} plugin events", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    handles.abort();
    info!("Stopped watching {}", ctx.plugins_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::plugin::PluginState;
    use tempfile::TempDir;

    fn write_plugin(dir: &std::path::Path, file: &str, name: &str, version: &str) {
        std::fs::write(
            dir.join(file),
            format!("/**\n * @name {}\n * @version {}\n * @author Tester\n */\nclass {} {{}}", name, version, name),
        )
        .unwrap();
    }

    fn context(temp: &TempDir) -> Context {
        let config = BridgeConfig {
            plugins_dir: Some(temp.path().join("plugins")),
            data_dir: Some(temp.path().join("data")),
            ..BridgeConfig::default()
        };
        Context::from_config(config).unwrap()
    }

    #[tokio::test]
    async fn test_inventory_reads_headers_only() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        write_plugin(&ctx.plugins_dir, "Beta.plugin.js", "Beta", "1.0.0");
        write_plugin(&ctx.plugins_dir, "Alpha.plugin.js", "Alpha", "2.1.0");
        std::fs::write(ctx.plugins_dir.join("notes.txt"), "ignored").unwrap();

        let manager = ctx.inventory().await.unwrap();
        let summaries = ctx.summaries(&manager);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "Alpha");
        assert!(summaries.iter().all(|s| s.state == PluginState::Loaded));
    }

    #[tokio::test]
    async fn test_set_enabled_persists_flag() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        write_plugin(&ctx.plugins_dir, "Alpha.plugin.js", "Alpha", "1.0.0");

        set_enabled(&ctx, &["Alpha.plugin.js".to_string()], true).await.unwrap();
        assert!(ctx.enabled.is_enabled("Alpha"));

        // 새로 열어도 유지
        let reopened = context(&temp);
        let manager = reopened.inventory().await.unwrap();
        assert!(reopened.summaries(&manager)[0].enabled);

        assert!(set_enabled(&ctx, &["Missing".to_string()], true).await.is_err());
    }

    #[test]
    fn test_render_table_marks_enabled() {
        let summary = |name: &str, enabled: bool| PluginSummary {
            id: name.to_string(),
            name: name.to_string(),
            version: "1.0.0".to_string(),
            author: "Tester".to_string(),
            description: String::new(),
            filename: format!("{}.plugin.js", name),
            enabled,
            state: PluginState::Loaded,
            has_settings_panel: false,
        };

        let table = render_table(&[summary("Alpha", true), summary("Beta", false)]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("✓"));
        assert!(lines[3].trim_start().starts_with("Beta"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long plugin name", 10), "a very ...");
    }
}
