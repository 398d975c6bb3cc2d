pub mod candidates;
pub mod cli;
pub mod collect;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fixer;
pub mod index;
pub mod model;
pub mod parser;
pub mod report;
pub mod resolver;
pub mod rewrite;
