pub mod services;
pub mod staging;

pub use services::{discard, forward};
pub use staging::StagedFile;
