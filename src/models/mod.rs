// src/models/mod.rs
pub mod driver;
pub mod job;

pub use driver::*;
pub use job::*;
