pub mod favorites;
pub mod merge;
pub mod progress;
