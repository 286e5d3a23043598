//! Clients for the external search and content services.

pub mod duckduckgo;
pub mod metaphor;

pub use duckduckgo::DuckDuckGo;
pub use metaphor::MetaphorClient;
