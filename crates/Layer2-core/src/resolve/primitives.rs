//! Host Primitives - 시작 시 한 번에 해결하는 핵심 호스트 모듈 테이블
//!
//! 각 항목은 필터, 모듈 id 힌트, 캐시 키로 구성됩니다.
//! 클래스 이름 모듈은 id 가 자주 바뀌므로 힌트가 없습니다.

use std::collections::HashMap;
use tracing::{info, warn};

use super::filters::{by_keys, by_prototype_keys, by_source, by_strings, Filter};
use super::search::{ModuleQuery, ModuleResolver, SearchOptions};
use crate::host::{HostValue, ModuleId};

/// 핵심 모듈 이름 - `ReactDOM` 은 Base 와 Client 를 합친 값
pub const REACT_DOM: &str = "ReactDOM";

fn query(filter: Filter, first_id: Option<u64>, cache_id: &str) -> ModuleQuery {
    let mut options = SearchOptions::new().cache_id(cache_id);
    if let Some(id) = first_id {
        options = options.first_id(ModuleId::Num(id));
    }
    ModuleQuery::new(filter).with_options(options)
}

fn exported(filter: Filter, first_id: Option<u64>, cache_id: &str) -> ModuleQuery {
    let mut q = query(filter, first_id, cache_id);
    q.options.search_exports = true;
    q
}

fn render_contains(needles: &'static [&'static str]) -> Filter {
    Filter::by_value("renderContains", move |value| {
        value
            .get("render")
            .and_then(HostValue::as_function)
            .is_some_and(|f| needles.iter().all(|n| f.source.contains(n)))
    })
}

/// 시작 시 해결할 쿼리 목록
pub fn core_queries() -> Vec<(&'static str, ModuleQuery)> {
    vec![
        (
            "React",
            query(by_keys(&["createElement", "cloneElement"]), Some(483362), "core-React"),
        ),
        (
            "ReactDOMBase",
            query(by_keys(&["createPortal"]), Some(165737), "core-ReactDOMBase"),
        ),
        (
            "ReactDOMClient",
            query(by_keys(&["createRoot"]), Some(152792), "core-ReactDOMClient"),
        ),
        (
            "Dispatcher",
            exported(
                by_keys(&["dispatch", "subscribe", "register"]),
                Some(570140),
                "core-Dispatcher",
            ),
        ),
        (
            "RemoteModule",
            query(by_keys(&["setBadge"]), Some(998502), "core-RemoteModule"),
        ),
        (
            "InviteActions",
            query(by_keys(&["createInvite"]), Some(447543), "core-InviteActions"),
        ),
        (
            "AccessibilityContext",
            exported(
                Filter::by_value("reducedMotionContext", |v| {
                    v.get_path(&["_currentValue", "reducedMotion"])
                        .is_some_and(HostValue::is_truthy)
                }),
                Some(159691),
                "core-AccessibilityContext",
            ),
        ),
        (
            "FocusLock",
            exported(
                render_contains(&["impressionProperties", ".Provider"]),
                Some(481060),
                "core-FocusLock",
            ),
        ),
        (
            "ReactSpring",
            query(by_keys(&["useTransition", "animated"]), Some(429783), "core-ReactSpring"),
        ),
        (
            "Anims",
            query(by_keys(&["Easing"]), Some(748780), "core-Anims"),
        ),
        (
            "SimpleMarkdown",
            query(
                by_keys(&["parseBlock", "parseInline", "defaultOutput"]),
                Some(159635),
                "core-SimpleMarkdown",
            ),
        ),
        (
            "Tooltip",
            exported(by_prototype_keys(&["renderTooltip"]), Some(481060), "core-Tooltip"),
        ),
        (
            "User",
            query(by_strings(&["hasHadPremium(){"]), Some(598077), "core-User"),
        ),
        (
            "createBotMessage",
            exported(
                by_strings(&["username:\"Clyde\""]),
                Some(3148),
                "core-createBotMessage",
            ),
        ),
        (
            "Messages",
            query(by_keys(&["receiveMessage"]), Some(904245), "core-Messages"),
        ),
        (
            "Icons",
            query(by_keys(&["BOT_AVATARS"]), Some(426563), "core-Icons"),
        ),
        ("Sidebar", {
            let mut q = query(
                by_strings(&[".BUILT_IN?", "categoryListRef:"]),
                Some(56801),
                "core-Sidebar",
            );
            q.options.default_export = false;
            q
        }),
        (
            "Flux",
            query(
                Filter::by_value("fluxStore", |v| {
                    v.get("Store").is_some_and(|store| store.has_key("getAll"))
                }),
                Some(442837),
                "core-Flux",
            ),
        ),
        (
            "ContextMenuMenu",
            exported(
                by_strings(&["getContainerProps()", ".keyboardModeEnabled&&null!="]),
                Some(481060),
                "core-ContextMenuMenu",
            ),
        ),
        (
            "ContextMenuToPatch",
            query(
                Filter::by_value("contextMenuClose", |v| {
                    v.entries().iter().any(|(_, value)| {
                        value
                            .as_function()
                            .is_some_and(|f| f.source.contains("type:\"CONTEXT_MENU_CLOSE\""))
                    })
                }),
                Some(239091),
                "core-ContextMenuToPatch",
            ),
        ),
        (
            "PrivateChannelActions",
            query(
                by_keys(&["openPrivateChannel"]),
                Some(493683),
                "core-PrivateChannelActions",
            ),
        ),
        (
            "ChannelActions",
            query(by_keys(&["selectPrivateChannel"]), Some(287734), "core-ChannelActions"),
        ),
        (
            "IndexStore",
            query(
                by_source(&[".getScoreWithoutLoadingLatest"]),
                Some(213459),
                "core-IndexStore",
            ),
        ),
        (
            "Authorizer",
            query(
                by_source(&["openOAuth2Modal", "Promise.resolve", "commandIntegrationTypes"]),
                Some(104919),
                "core-Authorizer",
            ),
        ),
        (
            "iconClasses",
            query(
                Filter::by_value("iconClasses", |v| {
                    ["wrapper", "icon", "selected", "selectable"]
                        .iter()
                        .all(|k| v.get(k).is_some_and(HostValue::is_truthy))
                        && !v.get("mask").is_some_and(HostValue::is_truthy)
                }),
                None,
                "core-iconClasses",
            ),
        ),
        (
            "builtInSeperatorClasses",
            query(by_keys(&["builtInSeparator"]), None, "core-builtInSeperatorClasses"),
        ),
        (
            "AnchorClasses",
            query(by_keys(&["anchorUnderlineOnHover"]), None, "core-AnchorClasses"),
        ),
    ]
}

// ============================================================================
// HostPrimitives
// ============================================================================

/// 해결된 핵심 모듈 테이블
#[derive(Debug, Default, Clone)]
pub struct HostPrimitives {
    modules: HashMap<String, HostValue>,
    missing: Vec<String>,
}

impl HostPrimitives {
    /// 핵심 모듈을 한 번의 순회로 해결
    pub fn load(resolver: &ModuleResolver) -> Self {
        let queries = core_queries();
        let mut modules = resolver.get_bulk(&queries);

        let base = modules.get("ReactDOMBase").cloned().unwrap_or_default();
        let client = modules.get("ReactDOMClient").cloned().unwrap_or_default();
        modules.insert(REACT_DOM.to_string(), HostValue::merged(&base, &client));

        let mut missing: Vec<String> = queries
            .iter()
            .filter(|(name, _)| !modules.contains_key(*name))
            .map(|(name, _)| name.to_string())
            .collect();
        missing.sort();

        if missing.is_empty() {
            info!("Resolved {} host primitives", queries.len());
        } else {
            warn!("Missing host primitives: {}", missing.join(", "));
        }

        Self { modules, missing }
    }

    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.modules.get(name)
    }

    /// 찾지 못한 모듈 이름
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
