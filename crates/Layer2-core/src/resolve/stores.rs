//! Stores - 이름 있는 상태 저장소 탐색

use std::collections::BTreeSet;

use super::filters::{by_store_name, should_skip_module};
use super::search::{ModuleResolver, SearchOptions};
use crate::host::HostValue;

/// 너무 짧은 저장소 이름은 minify 된 내부 클래스이므로 제외
const MIN_STORE_NAME_LEN: usize = 4;

impl ModuleResolver {
    /// 이름으로 저장소 찾기 (결과는 `store-<name>` 으로 캐시)
    pub fn get_store(&self, name: &str) -> Option<HostValue> {
        let options = SearchOptions::new()
            .search_exports(true)
            .cache_id(format!("store-{}", name));
        self.get(&by_store_name(name), &options)
    }

    /// 등록된 모든 저장소 이름 (정렬, 중복 제거)
    pub fn store_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();

        for id in self.registry.module_ids() {
            let Some(module) = self.registry.module(&id) else {
                continue;
            };
            if should_skip_module(&module.exports) {
                continue;
            }

            let candidates = std::iter::once(&module.exports)
                .chain(module.exports.entries().into_iter().map(|(_, v)| v));
            for value in candidates {
                if let Some(name) = value.store_name() {
                    if name.len() >= MIN_STORE_NAME_LEN {
                        names.insert(name.to_string());
                    }
                }
            }
        }

        names.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryRegistry, ModuleId};
    use std::sync::Arc;

    #[test]
    fn test_store_lookup_and_listing() {
        let registry = Arc::new(MemoryRegistry::new());
        let users = HostValue::store("UserStore", [("getUser", HostValue::function("f"))]);
        registry.define(ModuleId::Num(1), HostValue::object([("default", users.clone())]));
        registry.define(ModuleId::Num(2), HostValue::store("GuildStore", Vec::<(String, HostValue)>::new()));
        registry.define(ModuleId::Num(3), HostValue::store("e", Vec::<(String, HostValue)>::new()));
        let resolver = ModuleResolver::new(registry);

        assert_eq!(resolver.get_store("UserStore"), Some(users.clone()));
        assert_eq!(resolver.cache().get("store-UserStore"), Some(users));
        assert!(resolver.get_store("Nope").is_none());
        assert_eq!(resolver.store_names(), vec!["GuildStore", "UserStore"]);
    }
}
