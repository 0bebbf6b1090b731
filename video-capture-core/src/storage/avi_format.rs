//! AVI (RIFF) container format utilities for MJPEG video.
//!
//! Generates the fixed 224-byte header block and provides helpers for
//! patching the size and frame-count fields after recording completes,
//! plus `idx1` index construction.
//!
//! Layout (all little-endian):
//! ```text
//! [0]    "RIFF" <riff_size> "AVI "
//! [12]   LIST(192) "hdrl"
//! [24]     "avih"(56)   — main header: frame period, flags, counts, size
//! [88]     LIST(116) "strl"
//! [100]      "strh"(56) — "vids"/"MJPG" stream header, scale/rate, length
//! [164]      "strf"(40) — BITMAPINFOHEADER, biCompression = "MJPG"
//! [212]  LIST(movi_size) "movi"
//! [224]    "00dc" chunks (JPEG frames, padded to even length)
//! [...]  "idx1" — one 16-byte entry per chunk
//! ```

/// Size of the fixed header block preceding the first frame chunk.
pub const AVI_HEADER_SIZE: usize = 224;

/// Offset of the RIFF chunk size field (file size - 8).
pub const RIFF_SIZE_OFFSET: u64 = 4;
/// Offset of `dwTotalFrames` inside the `avih` chunk.
pub const TOTAL_FRAMES_OFFSET: u64 = 48;
/// Offset of `dwLength` inside the `strh` chunk.
pub const STREAM_LENGTH_OFFSET: u64 = 140;
/// Offset of the `movi` LIST size field.
pub const MOVI_SIZE_OFFSET: u64 = 216;

/// Index offsets are measured from the `movi` fourcc, so the first chunk
/// header sits at offset 4.
pub const FIRST_CHUNK_INDEX_OFFSET: u32 = 4;

/// Frame chunk fourcc: stream 00, compressed video.
pub const FRAME_CHUNK_ID: &[u8; 4] = b"00dc";

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;

/// One `idx1` entry describing a frame chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Byte offset of the chunk header, relative to the `movi` fourcc.
    pub offset: u32,
    /// Chunk data size, excluding the 8-byte header and pad byte.
    pub size: u32,
}

/// Generate the fixed AVI header block with zeroed counts and sizes.
///
/// `dwTotalFrames`, `dwLength`, the `movi` size and the RIFF size are
/// placeholders, patched via the `*_OFFSET` constants on close.
pub fn generate_avi_header(width: u32, height: u32, fps: f64) -> [u8; AVI_HEADER_SIZE] {
    let us_per_frame = (1_000_000.0 / fps).round() as u32;
    // dwScale = 1000 keeps fractional rates representable in dwRate.
    let scale = 1000u32;
    let rate = (fps * scale as f64).round() as u32;
    let frame_bytes = width * height * 3;

    let mut header = [0u8; AVI_HEADER_SIZE];
    let mut put = |offset: usize, bytes: &[u8]| {
        header[offset..offset + bytes.len()].copy_from_slice(bytes);
    };

    // RIFF chunk descriptor
    put(0, b"RIFF");
    put(8, b"AVI ");

    // hdrl list: avih + strl
    put(12, b"LIST");
    put(16, &192u32.to_le_bytes());
    put(20, b"hdrl");

    // avih — main AVI header
    put(24, b"avih");
    put(28, &56u32.to_le_bytes());
    put(32, &us_per_frame.to_le_bytes());
    put(36, &(frame_bytes.saturating_mul(fps.ceil() as u32)).to_le_bytes()); // max bytes/sec estimate
    put(44, &AVIF_HASINDEX.to_le_bytes());
    put(56, &1u32.to_le_bytes()); // one stream
    put(60, &frame_bytes.to_le_bytes()); // suggested buffer size
    put(64, &width.to_le_bytes());
    put(68, &height.to_le_bytes());

    // strl list: strh + strf
    put(88, b"LIST");
    put(92, &116u32.to_le_bytes());
    put(96, b"strl");

    // strh — video stream header
    put(100, b"strh");
    put(104, &56u32.to_le_bytes());
    put(108, b"vids");
    put(112, b"MJPG");
    put(128, &scale.to_le_bytes());
    put(132, &rate.to_le_bytes());
    put(144, &frame_bytes.to_le_bytes()); // suggested buffer size
    put(148, &u32::MAX.to_le_bytes()); // quality: driver default
    put(156, &0u16.to_le_bytes()); // rcFrame.left
    put(158, &0u16.to_le_bytes()); // rcFrame.top
    put(160, &(width as u16).to_le_bytes());
    put(162, &(height as u16).to_le_bytes());

    // strf — BITMAPINFOHEADER
    put(164, b"strf");
    put(168, &40u32.to_le_bytes());
    put(172, &40u32.to_le_bytes()); // biSize
    put(176, &(width as i32).to_le_bytes());
    put(180, &(height as i32).to_le_bytes());
    put(184, &1u16.to_le_bytes()); // biPlanes
    put(186, &24u16.to_le_bytes()); // biBitCount
    put(188, b"MJPG");
    put(192, &frame_bytes.to_le_bytes()); // biSizeImage

    // movi list; size patched on close
    put(212, b"LIST");
    put(220, b"movi");

    header
}

/// Header for one `00dc` frame chunk of `size` data bytes.
pub fn frame_chunk_header(size: u32) -> [u8; 8] {
    let mut chunk = [0u8; 8];
    chunk[0..4].copy_from_slice(FRAME_CHUNK_ID);
    chunk[4..8].copy_from_slice(&size.to_le_bytes());
    chunk
}

/// Bytes a chunk occupies in the `movi` list: header + data + pad to even.
pub fn chunk_span(data_size: u32) -> u32 {
    8 + data_size + (data_size & 1)
}

/// Build the `idx1` chunk from the recorded frame entries.
pub fn generate_index(entries: &[IndexEntry]) -> Vec<u8> {
    let mut index = Vec::with_capacity(8 + entries.len() * 16);
    index.extend_from_slice(b"idx1");
    index.extend_from_slice(&((entries.len() * 16) as u32).to_le_bytes());
    for entry in entries {
        index.extend_from_slice(FRAME_CHUNK_ID);
        index.extend_from_slice(&AVIIF_KEYFRAME.to_le_bytes());
        index.extend_from_slice(&entry.offset.to_le_bytes());
        index.extend_from_slice(&entry.size.to_le_bytes());
    }
    index
}
