pub mod types;
pub mod init;
pub mod buffer;
pub mod params;
pub mod dispatch;
pub mod info;

// Re-export main types and structs for convenience
pub use types::*;
