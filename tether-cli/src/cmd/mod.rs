pub mod config;
pub mod plan;
pub mod run;
pub mod validate;
