//! Command implementations for the overlay CLI

pub mod cache;
pub mod check;
pub mod completions;
pub mod diff;
mod helpers;
pub mod init;
pub mod list;
pub mod reconcile;
pub mod remount;
pub mod retire;
pub mod show;
pub mod sync;
pub mod tags;
pub mod version;
