//! CityEye — detection fusion for traffic video.
//!
//! Fuses vehicle tracker output, license-plate boxes and OCR readings into
//! one deduplicated event stream: color and plate are resolved at most once
//! per tracked vehicle and reused from a write-once cache on every later
//! frame. Events land in a metadata JSON file and a SQLite store that a
//! text-to-SQL agent answers questions against.

pub mod associate;
pub mod cache;
pub mod capture;
pub mod color;
pub mod config;
pub mod database;
pub mod detector;
pub mod emit;
pub mod imaging;
pub mod llm;
pub mod ocr;
pub mod pipeline;
pub mod query_engine;
pub mod stats_cli;
pub mod synthetic;
