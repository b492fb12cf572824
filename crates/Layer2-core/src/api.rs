//! Addon API - 플러그인이 보는 애드온 관리 인터페이스
//!
//! 모든 메서드는 id 또는 파일 이름을 받습니다.

use bridge_foundation::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::plugin::{PluginSummary, ReloadMode, SharedManager};

/// 애드온 API
#[derive(Clone)]
pub struct AddonApi {
    manager: SharedManager,
}

impl AddonApi {
    pub fn new(manager: &SharedManager) -> Self {
        Self {
            manager: Arc::clone(manager),
        }
    }

    /// 애드온 폴더 경로
    pub fn folder(&self) -> PathBuf {
        self.manager.lock().folder().to_path_buf()
    }

    pub fn is_enabled(&self, id_or_file: &str) -> bool {
        self.manager.lock().is_enabled(id_or_file)
    }

    pub fn enable(&self, id_or_file: &str) -> Result<()> {
        self.manager.lock().enable(id_or_file)
    }

    pub fn disable(&self, id_or_file: &str) -> Result<()> {
        self.manager.lock().disable(id_or_file)
    }

    pub fn toggle(&self, id_or_file: &str) -> Result<()> {
        self.manager.lock().toggle(id_or_file)
    }

    /// 활성화된 경우에만 다시 시작
    pub fn reload(&self, id_or_file: &str) -> Result<()> {
        self.manager.lock().reload(id_or_file, ReloadMode::Reuse)
    }

    pub fn get(&self, id_or_file: &str) -> Option<PluginSummary> {
        self.manager.lock().summary(id_or_file)
    }

    pub fn get_all(&self) -> Vec<PluginSummary> {
        self.manager.lock().summaries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::files::{MemoryAddonFiles, PluginFile};
    use crate::plugin::{PluginManager, PluginState};
    use crate::testing::{plugin_source, RecordingNotifier, ScriptedEngine};
    use bridge_foundation::MemoryEnabledStore;

    #[test]
    fn test_api_by_id_or_filename() {
        let mut manager = PluginManager::new(
            Arc::new(ScriptedEngine::default()),
            Arc::new(MemoryAddonFiles::new()),
            Arc::new(MemoryEnabledStore::new()),
            Arc::new(RecordingNotifier::default()),
        );
        manager.load_all(vec![PluginFile::new(
            "My Plugin.plugin.js",
            plugin_source("Mine", "1.0.0", "start(){} stop(){}"),
        )]);
        let api = AddonApi::new(&manager.into_shared());

        assert_eq!(api.folder(), PathBuf::from("plugins"));
        assert!(!api.is_enabled("Mine"));

        api.enable("My Plugin.plugin.js").unwrap();
        assert!(api.is_enabled("Mine"));
        let summary = api.get("Mine").unwrap();
        assert_eq!(summary.state, PluginState::Running);
        assert_eq!(summary.filename, "My Plugin.plugin.js");

        api.reload("Mine").unwrap();
        api.toggle("Mine").unwrap();
        assert!(!api.is_enabled("My Plugin.plugin.js"));
        assert_eq!(api.get_all().len(), 1);
        assert!(api.get("Missing").is_none());
        assert!(api.disable("Missing").is_err());
    }
}
