pub mod analysis;
pub mod config;
pub mod error;
pub mod job;
pub mod payload;
pub mod text;
pub mod types;

// Keep the public surface small and intentional.
pub use analysis::*;
pub use config::*;
pub use error::*;
pub use job::*;
pub use payload::*;
pub use text::*;
pub use types::*;
