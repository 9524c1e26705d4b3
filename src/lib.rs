pub mod analysis;
pub mod config;
pub mod error;
pub mod function;
pub mod interpreter;
pub mod ir;
pub mod optimizer;
pub mod plan;
pub mod rule;
pub mod types;
pub mod value;
