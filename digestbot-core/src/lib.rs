// src/lib.rs

pub mod cache;
pub mod config;
pub mod platforms;
pub mod repositories;
pub mod services;
pub mod summarizer;
pub mod tasks;
pub mod utils;

pub use digestbot_common::error::Error;
