//! Filters - 모듈 export 를 판별하는 predicate 모음
//!
//! 필터는 `(exports, module, id) -> bool` 형태이며, 탐색 엔진이
//! 모듈 전체 또는 각 export 값에 대해 호출합니다.

use std::fmt;
use std::sync::Arc;

use crate::host::{HostValue, ModuleId, ModuleRecord};

/// 기본 export 로 취급하는 키 (번들러 minify 결과 포함)
pub const DEFAULT_KEYS: [&str; 3] = ["Z", "ZP", "default"];

/// 필터 함수 시그니처
pub type FilterFn = dyn Fn(&HostValue, &ModuleRecord, &ModuleId) -> bool + Send + Sync;

// ============================================================================
// Filter
// ============================================================================

/// 이름이 붙은 필터
#[derive(Clone)]
pub struct Filter {
    label: Arc<str>,
    predicate: Arc<FilterFn>,
}

impl Filter {
    /// 임의의 predicate 로 필터 생성
    pub fn new<F>(label: impl AsRef<str>, predicate: F) -> Self
    where
        F: Fn(&HostValue, &ModuleRecord, &ModuleId) -> bool + Send + Sync + 'static,
    {
        Self {
            label: Arc::from(label.as_ref()),
            predicate: Arc::new(predicate),
        }
    }

    /// export 값만 보는 필터
    pub fn by_value<F>(label: impl AsRef<str>, predicate: F) -> Self
    where
        F: Fn(&HostValue) -> bool + Send + Sync + 'static,
    {
        Self::new(label, move |exports, _, _| predicate(exports))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// 필터 적용
    pub fn matches(&self, exports: &HostValue, module: &ModuleRecord, id: &ModuleId) -> bool {
        (self.predicate)(exports, module, id)
    }

    /// 모든 필터를 만족
    pub fn all(filters: Vec<Filter>) -> Self {
        let label = filters
            .iter()
            .map(|f| f.label())
            .collect::<Vec<_>>()
            .join(" && ");
        Self::new(label, move |exports, module, id| {
            filters.iter().all(|f| f.matches(exports, module, id))
        })
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Filter").field(&self.label).finish()
    }
}

// ============================================================================
// Filter 생성기
// ============================================================================

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// 지정한 속성을 모두 가진 export
pub fn by_keys(keys: &[&str]) -> Filter {
    let keys = owned(keys);
    Filter::by_value(format!("byKeys({})", keys.join(", ")), move |exports| {
        exports.is_truthy() && keys.iter().all(|k| exports.has_key(k))
    })
}

/// 프로토타입에 지정한 메서드를 모두 가진 클래스
pub fn by_prototype_keys(keys: &[&str]) -> Filter {
    let keys = owned(keys);
    Filter::by_value(
        format!("byPrototypeKeys({})", keys.join(", ")),
        move |exports| {
            exports
                .prototype_keys()
                .is_some_and(|proto| keys.iter().all(|k| proto.iter().any(|p| p == k)))
        },
    )
}

/// 문자열화한 export 가 지정한 문자열을 모두 포함
pub fn by_strings(strings: &[&str]) -> Filter {
    let strings = owned(strings);
    Filter::by_value(format!("byStrings({})", strings.join(", ")), move |exports| {
        stringified(exports).is_some_and(|text| strings.iter().all(|s| text.contains(s.as_str())))
    })
}

/// 모듈 팩토리 소스가 지정한 문자열을 모두 포함
pub fn by_source(strings: &[&str]) -> Filter {
    let strings = owned(strings);
    Filter::new(
        format!("bySource({})", strings.join(", ")),
        move |_, module, _| {
            module
                .source
                .as_deref()
                .is_some_and(|text| strings.iter().all(|s| text.contains(s.as_str())))
        },
    )
}

/// 이름으로 상태 저장소 찾기
pub fn by_store_name(name: &str) -> Filter {
    let name = name.to_string();
    Filter::by_value(format!("byStoreName({})", name), move |exports| {
        exports.store_name() == Some(name.as_str())
    })
}

/// 문자열 검색 대상 텍스트
///
/// 함수는 소스, 문자열은 그대로, `render`/`type` 을 감싼 컴포넌트 객체는
/// 내부 함수의 소스를 사용합니다.
fn stringified(value: &HostValue) -> Option<&str> {
    match value {
        HostValue::String(s) => Some(s),
        HostValue::Function(f) => Some(&f.source),
        HostValue::Object(_) => ["render", "type"]
            .iter()
            .filter_map(|k| value.get(k))
            .find_map(|inner| inner.as_function().map(|f| f.source.as_str())),
        _ => None,
    }
}

// ============================================================================
// 탐색 보조
// ============================================================================

/// 탐색할 가치가 없는 export (null/undefined/원시값)
pub fn should_skip_module(exports: &HostValue) -> bool {
    exports.is_primitive()
}

/// 모듈의 기본 export 키
pub fn default_key(exports: &HostValue) -> Option<&'static str> {
    DEFAULT_KEYS.iter().copied().find(|k| exports.get(k).is_some())
}
