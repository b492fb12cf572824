//! CLI 용 스크립트 엔진
//!
//! 터미널에서는 플러그인 코드를 실행하지 않습니다. 헤더만으로 목록,
//! 활성화 플래그, 업데이트를 다루고 평가 요청은 항상 거절합니다.

use bridge_core::plugin::{EvaluatedExport, ModuleSource, ScriptEngine, ScriptError};

/// 평가를 거절하는 엔진
#[derive(Debug, Default, Clone, Copy)]
pub struct InertEngine;

impl ScriptEngine for InertEngine {
    fn evaluate(&self, module: &ModuleSource) -> Result<EvaluatedExport, ScriptError> {
        Err(ScriptError::new(format!(
            "{} cannot run outside a host client",
            module.filename
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::plugin::{PluginFile, PluginLoader, PluginMeta};
    use std::sync::Arc;

    #[test]
    fn test_inert_engine_refuses() {
        let file = PluginFile::new("Foo.plugin.js", "/**\n * @name Foo\n */\nclass Foo {}");
        let meta = PluginMeta::from_file(&file).unwrap();
        let loader = PluginLoader::new(Arc::new(InertEngine), "plugins");

        let err = loader.evaluate(&meta).unwrap_err();
        assert!(err.to_string().contains("Foo.plugin.js cannot run outside a host client"));
    }
}
