pub mod assistant;
pub mod cross_chain;
pub mod dashboard;
