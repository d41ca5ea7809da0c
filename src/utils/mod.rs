//! 工具模块
//!
//! 提供各种工具函数和辅助功能

pub mod logger;
pub mod tail;

pub use logger::init_logger;
