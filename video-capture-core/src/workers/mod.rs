pub mod pacing;
pub mod previewer;
pub mod reader;
pub mod writer;
