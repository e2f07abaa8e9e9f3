pub mod api;
pub mod config;
pub mod error;
pub mod generator;
pub mod inference;
pub mod labels;
pub mod prompts;
pub mod transcript;
