//! Combined Grids - calibrated sampling grids for stereology
//!
//! This library provides functionality to:
//! - Resolve a grid definition against an image size and calibration
//! - Generate vector geometry for six grid types
//! - Save and reload applied grids as XML documents and history rows
//! - Check a saved grid against the image it is reapplied to

pub mod batch;
pub mod cli;
pub mod color;
pub mod config;
pub mod consistency;
pub mod geometry;
pub mod history;
pub mod models;
pub mod output;
pub mod renderer;
pub mod resolve;
pub mod shapes;
pub mod xml;
