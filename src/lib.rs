//! pkgselect - installer package selection engine
//!
//! Tracks which catalog packages and selection groups are to be installed,
//! deleted or updated, and keeps that intent consistent with the dependency
//! graph through a [`solver::DependencySolver`].

pub mod catalog;
pub mod cli;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod groups;
pub mod package;
pub mod packages;
pub mod selection_file;
pub mod selector;
pub mod snapshot;
pub mod solver;

pub use engine::{Engine, Environment};
pub use error::{Result, SelectError};
