//! Error types for AddonBridge
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// AddonBridge 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 / 저장소 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // 플러그인 관련
    // ========================================================================
    /// 첫 줄에 `/**` 헤더가 없는 파일 - 애드온 목록에서 제외됨
    #[error("Missing JSDoc header in {file}")]
    MissingHeader { file: String },

    /// 평가 결과가 생성자/팩토리가 아님
    #[error("Plugin {plugin} does not export a class/function")]
    MalformedExport { plugin: String },

    /// 인스턴스에 start 또는 stop 이 없음
    #[error("Plugin {plugin} instance is missing {missing} method")]
    IncompleteInstance { plugin: String, missing: String },

    /// 플러그인 코드 실행 중 발생한 예외
    #[error("Plugin {plugin} failed: {message}")]
    PluginRuntime { plugin: String, message: String },

    // ========================================================================
    // 모듈 탐색 관련
    // ========================================================================
    /// 비동기 모듈 탐색이 signal 로 취소됨 (fatal 모드)
    #[error("Aborted")]
    Aborted,

    // ========================================================================
    // 네트워크 관련
    // ========================================================================
    #[error("Network error: {0}")]
    Network(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 재시도 가능한 에러인지 확인
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// 특정 플러그인에 격리되는 실패인지 확인
    pub fn is_plugin_failure(&self) -> bool {
        matches!(
            self,
            Error::MissingHeader { .. }
                | Error::MalformedExport { .. }
                | Error::IncompleteInstance { .. }
                | Error::PluginRuntime { .. }
        )
    }

    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        self.is_plugin_failure()
            || matches!(
                self,
                Error::NotFound(_) | Error::InvalidInput(_) | Error::Network(_)
            )
    }

    /// 플러그인 런타임 에러 생성 헬퍼
    pub fn runtime(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::PluginRuntime {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// 네트워크 에러 생성 헬퍼
    pub fn network(message: impl std::fmt::Display) -> Self {
        Error::Network(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_failures_are_user_facing() {
        let err = Error::MissingHeader {
            file: "Foo.plugin.js".into(),
        };
        assert!(err.is_plugin_failure());
        assert!(err.is_user_facing());
        assert_eq!(err.to_string(), "Missing JSDoc header in Foo.plugin.js");

        assert!(!Error::Aborted.is_user_facing());
        assert!(Error::network("timeout").is_retryable());
    }

    #[test]
    fn test_runtime_helper() {
        let err = Error::runtime("Foo", "boom");
        assert_eq!(err.to_string(), "Plugin Foo failed: boom");
    }
}
