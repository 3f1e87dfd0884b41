pub mod aggregate;
pub mod benchmark;
pub mod beta;
pub mod company;
pub mod disclosure;
pub mod metric_spec;
pub mod pipeline;
pub mod regression;
pub mod size;
