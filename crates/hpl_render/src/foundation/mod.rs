//! Foundation types shared by every other module

pub mod collections;
pub mod logging;
pub mod math;
