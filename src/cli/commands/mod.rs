//! CLI command implementations

pub mod config;
pub mod fingerprint;
pub mod run;

pub use config::execute as config;
pub use fingerprint::execute as fingerprint;
pub use run::execute as run;
