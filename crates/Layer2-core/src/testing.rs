//! 테스트용 가짜 구현 (알림 기록, 스크립트 엔진)

use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

use crate::host::HostValue;
use crate::plugin::loader::{
    ConstructHow, EvaluatedExport, ExportedCallable, ModuleSource, PluginInstance, ScriptEngine,
    ScriptError,
};
use crate::toast::{Notification, Notifier, Toast, ToastKind};

// ============================================================================
// RecordingNotifier
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    pub toasts: Mutex<Vec<Toast>>,
    pub notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.toasts.lock().iter().map(|t| t.message.clone()).collect()
    }

    pub fn count(&self, kind: ToastKind) -> usize {
        self.toasts.lock().iter().filter(|t| t.kind == kind).count()
    }

    pub fn clear(&self) {
        self.toasts.lock().clear();
        self.notifications.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn toast(&self, toast: Toast) {
        self.toasts.lock().push(toast);
    }

    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

// ============================================================================
// ScriptedEngine
// ============================================================================

lazy_static! {
    static ref CLASS: Regex =
        Regex::new(r"(?s)class\s+(\w+)\s*\{(.*)\}").expect("valid class pattern");
    static ref METHOD: Regex =
        Regex::new(r"(\w+)\s*\([^)]*\)\s*\{([^}]*)\}").expect("valid method pattern");
    static ref THROW: Regex = Regex::new(r#"throw\s+"([^"]*)""#).expect("valid throw pattern");
}

/// 호출 기록 (`Foo.start` 형식)
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// `class Foo { start(){} stop(){} }` 모양만 이해하는 엔진
///
/// 메서드 본문에 `throw "msg"` 가 있으면 호출 시 실패합니다.
#[derive(Default)]
pub struct ScriptedEngine {
    pub calls: CallLog,
    pub evaluations: Mutex<usize>,
}

impl ScriptedEngine {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn evaluations(&self) -> usize {
        *self.evaluations.lock()
    }
}

impl ScriptEngine for ScriptedEngine {
    fn evaluate(&self, module: &ModuleSource) -> Result<EvaluatedExport, ScriptError> {
        *self.evaluations.lock() += 1;

        if let Some(caps) = CLASS.captures(&module.code) {
            let methods = METHOD
                .captures_iter(&caps[2])
                .map(|m| {
                    let failure = THROW.captures(&m[2]).map(|t| t[1].to_string());
                    (m[1].to_string(), failure)
                })
                .collect();
            return Ok(EvaluatedExport::Class(Arc::new(ScriptedClass {
                name: caps[1].to_string(),
                methods,
                calls: self.calls.clone(),
            })));
        }

        if module.code.contains("module.exports = {") {
            return Ok(EvaluatedExport::Value(HostValue::object([(
                "start",
                HostValue::function("function start() {}"),
            )])));
        }

        Err(ScriptError::new(format!("SyntaxError in {}", module.filename)))
    }
}

struct ScriptedClass {
    name: String,
    methods: HashMap<String, Option<String>>,
    calls: CallLog,
}

impl ExportedCallable for ScriptedClass {
    fn invoke(&self, _how: ConstructHow, _meta: &JsonValue) -> Result<Box<dyn PluginInstance>, ScriptError> {
        if let Some(Some(message)) = self.methods.get("constructor") {
            return Err(ScriptError::new(message.clone()));
        }
        Ok(Box::new(ScriptedInstance {
            name: self.name.clone(),
            methods: self.methods.clone(),
            calls: self.calls.clone(),
        }))
    }
}

struct ScriptedInstance {
    name: String,
    methods: HashMap<String, Option<String>>,
    calls: CallLog,
}

impl PluginInstance for ScriptedInstance {
    fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    fn call(&mut self, method: &str, _args: &[HostValue]) -> Result<HostValue, ScriptError> {
        self.calls.lock().push(format!("{}.{}", self.name, method));
        match self.methods.get(method) {
            Some(Some(message)) => Err(ScriptError::new(message.clone())),
            Some(None) => Ok(HostValue::string(format!("{}:{}", self.name, method))),
            None => Err(ScriptError::new(format!("{}.{} is not a function", self.name, method))),
        }
    }
}

/// 헤더 + 클래스 본문으로 플러그인 소스 생성
pub fn plugin_source(name: &str, version: &str, body: &str) -> String {
    format!(
        "/** @name {name}\n * @version {version}\n */\nclass {name} {{ {body} }}",
        name = name,
        version = version,
        body = body
    )
}
