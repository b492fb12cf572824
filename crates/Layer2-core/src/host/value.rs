//! Host Value - 호스트 번들러가 노출하는 값의 모델
//!
//! 모듈 export 는 원시값, 함수(소스 텍스트 + 프로토타입 메서드), 객체(순서 있는 속성)
//! 중 하나입니다. 함수와 객체는 `Arc` 로 공유되며 동일성(identity)으로 비교됩니다.

use std::borrow::Cow;
use std::sync::Arc;

// ============================================================================
// HostValue
// ============================================================================

/// 호스트 런타임 값
#[derive(Debug, Clone, Default)]
pub enum HostValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Function(Arc<FunctionValue>),
    Object(Arc<ObjectValue>),
}

/// 함수 값 (클래스 포함)
#[derive(Debug, Default)]
pub struct FunctionValue {
    /// 함수 이름 (익명이면 빈 문자열)
    pub name: String,
    /// `toString()` 결과 - 필터가 문자열 검색에 사용
    pub source: String,
    /// 프로토타입에 정의된 메서드 이름
    pub prototype: Vec<String>,
    /// 함수 자체에 붙은 정적 속성
    pub properties: Vec<(String, HostValue)>,
}

/// 객체 값
#[derive(Debug, Default)]
pub struct ObjectValue {
    /// 선언 순서가 유지되는 속성 목록
    pub properties: Vec<(String, HostValue)>,
    /// 상태 저장소라면 그 이름 (`getName()` 결과)
    pub store_name: Option<String>,
}

impl HostValue {
    // ========================================================================
    // 생성
    // ========================================================================

    /// 문자열 값
    pub fn string(value: impl AsRef<str>) -> Self {
        HostValue::String(Arc::from(value.as_ref()))
    }

    /// 함수 값 (소스 텍스트만)
    pub fn function(source: impl Into<String>) -> Self {
        HostValue::Function(Arc::new(FunctionValue {
            source: source.into(),
            ..Default::default()
        }))
    }

    /// 클래스 값 (이름, 소스, 프로토타입 메서드)
    pub fn class<I, S>(name: impl Into<String>, source: impl Into<String>, prototype: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HostValue::Function(Arc::new(FunctionValue {
            name: name.into(),
            source: source.into(),
            prototype: prototype.into_iter().map(Into::into).collect(),
            properties: Vec::new(),
        }))
    }

    /// 객체 값
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, HostValue)>,
        K: Into<String>,
    {
        HostValue::Object(Arc::new(ObjectValue {
            properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            store_name: None,
        }))
    }

    /// 이름 있는 상태 저장소 객체
    pub fn store<I, K>(name: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, HostValue)>,
        K: Into<String>,
    {
        HostValue::Object(Arc::new(ObjectValue {
            properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            store_name: Some(name.into()),
        }))
    }

    /// 두 객체의 속성을 합친 새 객체 (뒤쪽이 우선)
    pub fn merged(base: &HostValue, overlay: &HostValue) -> HostValue {
        let mut properties: Vec<(String, HostValue)> = Vec::new();
        for (key, value) in base.entries().into_iter().chain(overlay.entries()) {
            match properties.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value.clone(),
                None => properties.push((key.to_string(), value.clone())),
            }
        }
        HostValue::object(properties)
    }

    // ========================================================================
    // 분류
    // ========================================================================

    /// null 또는 undefined
    pub fn is_nullish(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    /// 속성을 가질 수 없는 값
    pub fn is_primitive(&self) -> bool {
        !matches!(self, HostValue::Function(_) | HostValue::Object(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, HostValue::Function(_))
    }

    /// 호스트 언어의 truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            HostValue::Undefined | HostValue::Null => false,
            HostValue::Bool(b) => *b,
            HostValue::Number(n) => *n != 0.0 && !n.is_nan(),
            HostValue::String(s) => !s.is_empty(),
            HostValue::Function(_) | HostValue::Object(_) => true,
        }
    }

    // ========================================================================
    // 속성 접근
    // ========================================================================

    /// 자기 속성 목록 (원시값은 빈 목록)
    pub fn entries(&self) -> Vec<(&str, &HostValue)> {
        let properties = match self {
            HostValue::Function(f) => &f.properties,
            HostValue::Object(o) => &o.properties,
            _ => return Vec::new(),
        };
        properties.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }

    /// 자기 속성 이름
    pub fn keys(&self) -> Vec<&str> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    /// 속성 조회
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        let properties = match self {
            HostValue::Function(f) => &f.properties,
            HostValue::Object(o) => &o.properties,
            _ => return None,
        };
        properties.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// 중첩 속성 조회 (`a.b.c`)
    pub fn get_path(&self, path: &[&str]) -> Option<&HostValue> {
        path.iter().try_fold(self, |value, key| value.get(key))
    }

    /// `key in value` - 자기 속성 또는 프로토타입 메서드
    pub fn has_key(&self, key: &str) -> bool {
        self.get(key).is_some()
            || self
                .prototype_keys()
                .is_some_and(|proto| proto.iter().any(|k| k == key))
    }

    /// 함수의 프로토타입 메서드 이름
    pub fn prototype_keys(&self) -> Option<&[String]> {
        match self {
            HostValue::Function(f) => Some(&f.prototype),
            _ => None,
        }
    }

    /// 상태 저장소 이름
    pub fn store_name(&self) -> Option<&str> {
        match self {
            HostValue::Object(o) => o.store_name.as_deref(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionValue> {
        match self {
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }

    /// `String(value)` 에 해당하는 문자열화
    pub fn to_js_string(&self) -> Cow<'_, str> {
        match self {
            HostValue::Undefined => Cow::Borrowed("undefined"),
            HostValue::Null => Cow::Borrowed("null"),
            HostValue::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            HostValue::Number(n) => Cow::Owned(format_number(*n)),
            HostValue::String(s) => Cow::Borrowed(s),
            HostValue::Function(f) => Cow::Borrowed(&f.source),
            HostValue::Object(_) => Cow::Borrowed("[object Object]"),
        }
    }

    /// 동일성 비교 - 함수/객체는 같은 인스턴스여야 함
    pub fn same(&self, other: &HostValue) -> bool {
        match (self, other) {
            (HostValue::Undefined, HostValue::Undefined) => true,
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::Function(a), HostValue::Function(b)) => Arc::ptr_eq(a, b),
            (HostValue::Object(a), HostValue::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::string(value)
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(Arc::from(value))
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Number(value)
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_equality() {
        let a = HostValue::object([("x", HostValue::Number(1.0))]);
        let b = HostValue::object([("x", HostValue::Number(1.0))]);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(HostValue::from("s"), HostValue::from("s"));
    }

    #[test]
    fn test_has_key_includes_prototype() {
        let class = HostValue::class("Tooltip", "class Tooltip {}", ["renderTooltip", "show"]);
        assert!(class.has_key("renderTooltip"));
        assert!(!class.has_key("hide"));
        assert!(class.get("renderTooltip").is_none());
    }

    #[test]
    fn test_to_js_string() {
        assert_eq!(HostValue::Number(3.0).to_js_string(), "3");
        assert_eq!(HostValue::Number(0.5).to_js_string(), "0.5");
        assert_eq!(HostValue::function("()=>1").to_js_string(), "()=>1");
        let empty = HostValue::object(Vec::<(String, HostValue)>::new());
        assert_eq!(empty.to_js_string(), "[object Object]");
    }

    #[test]
    fn test_merged_overlay_wins() {
        let base = HostValue::object([("a", HostValue::from(1.0)), ("b", HostValue::from(2.0))]);
        let overlay = HostValue::object([("b", HostValue::from(3.0))]);
        let merged = HostValue::merged(&base, &overlay);

        assert_eq!(merged.keys(), vec!["a", "b"]);
        assert_eq!(merged.get("b"), Some(&HostValue::Number(3.0)));
    }

    #[test]
    fn test_get_path() {
        let ctx = HostValue::object([(
            "_currentValue",
            HostValue::object([("reducedMotion", HostValue::object([("enabled", true.into())]))]),
        )]);
        assert!(ctx.get_path(&["_currentValue", "reducedMotion"]).is_some());
        assert!(ctx.get_path(&["_currentValue", "missing"]).is_none());
    }
}
