//! CLI commands implementation

pub mod import;
pub mod init;
pub mod jobs;
pub mod status;
pub mod topic;

pub use import::*;
pub use init::*;
pub use jobs::*;
pub use status::*;
pub use topic::*;
