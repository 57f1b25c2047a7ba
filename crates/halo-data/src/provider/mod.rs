//! 데이터 Provider 모듈.
//!
//! ## Python 브리지
//! - `PythonBridgeSource`: 하위 프로세스로 Python 데이터 패키지를 호출
//! - 응답은 `{success, data?, error?}` 봉투(`ApiResponse`)로 수신

pub mod python_bridge;

pub use python_bridge::{ApiResponse, PythonBridgeConfig, PythonBridgeSource};
