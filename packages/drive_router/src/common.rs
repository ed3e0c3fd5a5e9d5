//! Types and helpers shared by the loading, routing and api modules.

pub mod bbox;
pub mod config;
pub mod error;
pub mod graph_data;
pub mod template;
