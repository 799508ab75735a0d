pub mod cloud;
pub mod frame;
pub mod level;
pub mod query;

pub use level::{Level, LevelError, ServiceLevel};
