// src/lib.rs

//! CORD-19 paper ingestion and search library

pub mod backend;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;
