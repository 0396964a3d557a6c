//! Chromium page capability for rowpilot, driven over the DevTools protocol.

pub mod backend;
pub mod cdp;
pub mod inject;
pub mod launcher;

pub use backend::HeadlessBackend;
pub use launcher::HeadlessLauncher;
