pub mod cli;
pub mod config;
pub mod console;
pub mod exec;
pub mod input;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod util;
pub mod verdict;
