pub mod esrs;
pub mod rules;
