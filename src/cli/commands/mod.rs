//! CLI command implementations

pub mod cache;
pub mod closure;
pub mod config;
pub mod run;

pub use cache::execute as cache;
pub use closure::execute as closure;
pub use config::execute as config;
pub use run::execute as run;
