//! 核心数据模型与通用原语
//!
//! 包含受监管进程的数据模型和有界轮询原语

pub mod models;
pub mod poll;
