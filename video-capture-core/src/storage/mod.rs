pub mod avi_format;
pub mod metadata;
pub mod still;
pub mod video_file_writer;
