pub mod camera_delegate;
pub mod display_sink;
pub mod video_source;
