//! 集成测试公共设施

#![allow(dead_code)]

pub mod simulator;

pub use simulator::{SimAxis, Simulator};
