//! Report jobs: the persisted history and the generation driver.

pub mod generation;
pub mod history;
