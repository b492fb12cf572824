//! Host - 호스트 런타임과의 경계
//!
//! - `value`: 호스트 값 모델 (HostValue)
//! - `registry`: 모듈 저장소 인터페이스 (ModuleRegistry)

mod registry;
mod value;

pub use registry::{MemoryRegistry, ModuleId, ModuleRecord, ModuleRegistry};
pub use value::{FunctionValue, HostValue, ObjectValue};
