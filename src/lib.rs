//! Revision history tooltips for test manager pages: hovering a revision link
//! shows the surrounding window of VCS history in an overlay placed next to
//! the link.

pub mod config;
pub mod diag;
pub mod driver;
pub mod file_format;
pub mod hover;
pub mod loader;
pub mod logging;
pub mod manager;
pub mod placement;
pub mod render;
pub mod timestamp;
