pub mod compliance;
pub mod estimators;
pub mod returns;
pub mod scoring;
pub mod size;
