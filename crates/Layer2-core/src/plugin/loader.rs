//! Plugin Loader - 플러그인 소스 실행 경계
//!
//! 외부 텍스트를 실행하는 곳은 `ScriptEngine` 하나뿐입니다. 로더는 소스를
//! 감싸서 엔진에 넘기고, 결과 export 를 생성자/팩토리로 분류한 뒤
//! 인스턴스를 만듭니다.

use bridge_foundation::{Error, Result};
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::meta::PluginMeta;
use crate::host::HostValue;

/// 래퍼 함수가 받는 인자 이름
pub const WRAPPER_PARAMS: [&str; 6] = ["require", "module", "exports", "__filename", "__dirname", "global"];

/// 디버거에 표시되는 소스 위치 접두사
pub const SOURCE_URL_PREFIX: &str = "betterdiscord://bdplugins/";

/// 인스턴스 메서드 이름
pub mod methods {
    pub const START: &str = "start";
    pub const STOP: &str = "stop";
    pub const OBSERVER: &str = "observer";
    pub const GET_SETTINGS_PANEL: &str = "getSettingsPanel";
    pub const ON_SWITCH: &str = "onSwitch";
}

// ============================================================================
// ScriptError / PluginInstance
// ============================================================================

/// 플러그인 코드에서 발생한 예외
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
    pub stack: Option<String>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// 실행 중인 플러그인 인스턴스
pub trait PluginInstance: Send {
    /// 메서드 존재 여부
    fn has_method(&self, name: &str) -> bool;

    /// 메서드 호출
    fn call(&mut self, method: &str, args: &[HostValue]) -> std::result::Result<HostValue, ScriptError>;
}

/// 생성자 또는 팩토리로 호출 가능한 export
pub trait ExportedCallable: Send + Sync {
    /// `new Export(meta)` 또는 `Export(meta)`
    fn invoke(
        &self,
        how: ConstructHow,
        meta: &JsonValue,
    ) -> std::result::Result<Box<dyn PluginInstance>, ScriptError>;
}

// ============================================================================
// EvaluatedExport / ConstructHow
// ============================================================================

/// 인스턴스 생성 방식 - 로드 시 한 번 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructHow {
    /// 프로토타입이 있는 클래스/함수 → `new`
    Constructor,
    /// 화살표 함수 등 → 직접 호출
    Factory,
}

/// 소스 평가 결과
#[derive(Clone)]
pub enum EvaluatedExport {
    /// 클래스 (생성자)
    Class(Arc<dyn ExportedCallable>),
    /// 프로토타입 없는 함수 (팩토리)
    Function(Arc<dyn ExportedCallable>),
    /// 호출할 수 없는 값
    Value(HostValue),
}

impl EvaluatedExport {
    /// 호출 방식 (호출 불가면 `None`)
    pub fn construct_how(&self) -> Option<ConstructHow> {
        match self {
            EvaluatedExport::Class(_) => Some(ConstructHow::Constructor),
            EvaluatedExport::Function(_) => Some(ConstructHow::Factory),
            EvaluatedExport::Value(_) => None,
        }
    }
}

impl fmt::Debug for EvaluatedExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluatedExport::Class(_) => f.write_str("Class"),
            EvaluatedExport::Function(_) => f.write_str("Function"),
            EvaluatedExport::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

// ============================================================================
// ModuleSource / ScriptEngine
// ============================================================================

/// 엔진에 넘기는 모듈 소스와 환경
#[derive(Debug, Clone)]
pub struct ModuleSource {
    /// 래핑된 코드
    pub code: String,
    pub filename: String,
    /// 파일 절대 경로 (`__filename`)
    pub path: PathBuf,
    /// 플러그인 폴더 (`__dirname`)
    pub dirname: PathBuf,
    pub source_url: String,
    pub params: &'static [&'static str],
}

/// 외부 코드 실행 엔진
pub trait ScriptEngine: Send + Sync {
    /// 래퍼 함수로 소스를 실행하고 `module.exports` 를 반환
    fn evaluate(&self, module: &ModuleSource) -> std::result::Result<EvaluatedExport, ScriptError>;
}

/// 식별자로 쓸 수 있는 이름인지 확인
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// 플러그인 소스에 export 정리 구문과 소스 위치를 덧붙임
///
/// - `module.exports.default` 가 있으면 그것을 export 로 승격
/// - export 가 함수가 아니면 선언된 이름의 전역 클래스를 찾음
pub fn wrap_source(meta: &PluginMeta, content: &str) -> String {
    let mut code = String::with_capacity(content.len() + 256);
    code.push_str(content);
    code.push_str("\nif(module.exports.default) module.exports = module.exports.default;");

    if let Some(name) = meta.name.as_deref().filter(|n| is_identifier(n)) {
        let literal = serde_json::to_string(name).unwrap_or_else(|_| format!("\"{}\"", name));
        code.push_str(&format!(
            "\nelse if(typeof module.exports !== \"function\") module.exports = eval({});",
            literal
        ));
    }

    code.push_str(&format!("\n//# sourceURL={}{}", SOURCE_URL_PREFIX, meta.filename));
    code
}

// ============================================================================
// PluginLoader
// ============================================================================

/// 소스 평가와 인스턴스 생성
#[derive(Clone)]
pub struct PluginLoader {
    engine: Arc<dyn ScriptEngine>,
    plugins_dir: PathBuf,
}

impl PluginLoader {
    pub fn new(engine: Arc<dyn ScriptEngine>, plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            plugins_dir: plugins_dir.into(),
        }
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// 엔진 입력 생성
    pub fn module_source(&self, meta: &PluginMeta) -> ModuleSource {
        ModuleSource {
            code: wrap_source(meta, &meta.file_content),
            filename: meta.filename.clone(),
            path: self.plugins_dir.join(&meta.filename),
            dirname: self.plugins_dir.clone(),
            source_url: format!("{}{}", SOURCE_URL_PREFIX, meta.filename),
            params: &WRAPPER_PARAMS,
        }
    }

    /// 소스 평가
    pub fn evaluate(&self, meta: &PluginMeta) -> Result<EvaluatedExport> {
        let source = self.module_source(meta);
        debug!("Evaluating {}", source.source_url);
        self.engine
            .evaluate(&source)
            .map_err(|e| Error::runtime(meta.display_name(), e.message))
    }

    /// export 를 호출해 인스턴스 생성
    ///
    /// 호출할 수 없는 export 는 `MalformedExport`, start/stop 이 없으면
    /// `IncompleteInstance`.
    pub fn instantiate(&self, meta: &PluginMeta, export: &EvaluatedExport) -> Result<Box<dyn PluginInstance>> {
        let (how, callable) = match export {
            EvaluatedExport::Class(c) => (ConstructHow::Constructor, c),
            EvaluatedExport::Function(c) => (ConstructHow::Factory, c),
            EvaluatedExport::Value(_) => {
                return Err(Error::MalformedExport {
                    plugin: meta.display_name().to_string(),
                })
            }
        };

        let instance = callable
            .invoke(how, &meta.to_json())
            .map_err(|e| Error::runtime(meta.display_name(), e.message))?;

        for required in [methods::START, methods::STOP] {
            if !instance.has_method(required) {
                return Err(Error::IncompleteInstance {
                    plugin: meta.display_name().to_string(),
                    missing: required.to_string(),
                });
            }
        }

        Ok(instance)
    }
}
