//! Context Menu - 설정 톱니바퀴 메뉴에 플러그인 토글 추가
//!
//! 호스트 메뉴는 `MenuItem` 트리로 다루고, 패치는 메뉴 id 별로 등록합니다.

use bridge_foundation::Result;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::host::HostValue;
use crate::plugin::{PluginManager, SharedManager};

/// 패치 대상 메뉴
pub const SETTINGS_MENU: &str = "user-settings-cog";

/// 플러그인 서브메뉴 id
pub const PLUGINS_SUBMENU: &str = "bd-plugins";

/// 스토어 열기 항목 id
pub const STORE_ITEM: &str = "no-plugins";

const TOGGLE_PREFIX: &str = "plugin-";

// ============================================================================
// MenuItem
// ============================================================================

/// 메뉴 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MenuItem {
    Separator,
    Toggle { id: String, label: String, active: bool },
    Action { id: String, label: String },
    Submenu { id: String, label: String, items: Vec<MenuItem> },
}

impl MenuItem {
    pub fn id(&self) -> Option<&str> {
        match self {
            MenuItem::Separator => None,
            MenuItem::Toggle { id, .. } | MenuItem::Action { id, .. } | MenuItem::Submenu { id, .. } => Some(id),
        }
    }

    /// 하위 메뉴까지 id 로 찾기
    pub fn find<'a>(items: &'a [MenuItem], id: &str) -> Option<&'a MenuItem> {
        items.iter().find_map(|item| {
            if item.id() == Some(id) {
                return Some(item);
            }
            match item {
                MenuItem::Submenu { items, .. } => MenuItem::find(items, id),
                _ => None,
            }
        })
    }
}

/// 메뉴 클릭 결과
#[derive(Debug, Clone, PartialEq)]
pub enum MenuAction {
    Ignored,
    Toggled { id: String, enabled: bool },
    OpenSettings { title: String, panel: HostValue },
    OpenStore,
}

// ============================================================================
// 플러그인 메뉴
// ============================================================================

/// 토글 항목들 + 스토어 항목
pub fn plugin_menu_items(manager: &PluginManager) -> Vec<MenuItem> {
    let mut items: Vec<MenuItem> = manager
        .plugins()
        .iter()
        .map(|p| MenuItem::Toggle {
            id: format!("{}{}", TOGGLE_PREFIX, p.id()),
            label: p.name().to_string(),
            active: manager.is_enabled(p.id()),
        })
        .collect();

    items.push(MenuItem::Action {
        id: STORE_ITEM.to_string(),
        label: "View plugin store".to_string(),
    });
    items
}

/// 구분선과 "BD Plugins" 서브메뉴를 덧붙임
pub fn append_plugin_submenu(items: &mut Vec<MenuItem>, manager: &PluginManager) {
    items.push(MenuItem::Separator);
    items.push(MenuItem::Submenu {
        id: PLUGINS_SUBMENU.to_string(),
        label: "BD Plugins".to_string(),
        items: plugin_menu_items(manager),
    });
}

/// 항목 클릭 처리
///
/// 그냥 클릭하면 토글, shift 클릭이면 (활성화되어 있고 패널이 있을 때) 설정 열기.
pub fn handle_menu_click(manager: &mut PluginManager, item_id: &str, shift: bool) -> Result<MenuAction> {
    if item_id == STORE_ITEM {
        return Ok(MenuAction::OpenStore);
    }

    let Some(id) = item_id.strip_prefix(TOGGLE_PREFIX) else {
        return Ok(MenuAction::Ignored);
    };
    let Some(name) = manager.get(id).map(|p| p.name().to_string()) else {
        debug!("Menu item for unknown plugin {}", id);
        return Ok(MenuAction::Ignored);
    };

    if !shift {
        manager.toggle(id)?;
        return Ok(MenuAction::Toggled {
            id: id.to_string(),
            enabled: manager.is_enabled(id),
        });
    }

    if !manager.is_enabled(id) || !manager.has_settings_panel(id) {
        return Ok(MenuAction::Ignored);
    }

    let panel = manager.settings_panel(id)?;
    Ok(MenuAction::OpenSettings { title: name, panel })
}

// ============================================================================
// ContextMenuPatcher
// ============================================================================

pub type MenuPatch = dyn Fn(&mut Vec<MenuItem>) + Send + Sync;

/// 메뉴 id 별 패치 목록
#[derive(Default)]
pub struct ContextMenuPatcher {
    patches: RwLock<HashMap<String, Vec<Arc<MenuPatch>>>>,
}

impl ContextMenuPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patch(&self, nav_id: &str, patch: impl Fn(&mut Vec<MenuItem>) + Send + Sync + 'static) {
        self.patches
            .write()
            .entry(nav_id.to_string())
            .or_default()
            .push(Arc::new(patch));
    }

    pub fn unpatch_all(&self, nav_id: &str) {
        self.patches.write().remove(nav_id);
    }

    /// 메뉴를 그릴 때 호출
    pub fn apply(&self, nav_id: &str, items: &mut Vec<MenuItem>) {
        let patches = self.patches.read().get(nav_id).cloned().unwrap_or_default();
        for patch in patches {
            patch(items);
        }
    }
}

/// 설정 톱니바퀴 메뉴 패치 등록
pub fn patch_settings_menu(patcher: &ContextMenuPatcher, shared: &SharedManager) {
    let shared = Arc::clone(shared);
    patcher.patch(SETTINGS_MENU, move |items| {
        append_plugin_submenu(items, &shared.lock());
    });
}
