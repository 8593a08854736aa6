pub mod config;
pub mod console;
pub mod microphone;
pub mod prompt_loader;
