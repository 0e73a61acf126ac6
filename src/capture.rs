use std::io;
use std::path::Path;

use tracing::debug;

use crate::error::DecodeError;

/// JPEG start-of-image marker; the rover's camera streams raw JPEG.
pub const IMAGE_BEGIN: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker.
pub const IMAGE_END: [u8; 2] = [0xFF, 0xD9];

/// One captured deployment image: the raw JPEG bytes as received
/// (markers included) plus the codec's decoded pixels for the display
/// collaborator. The raw bytes are what gets persisted.
#[derive(Clone, Debug)]
pub struct ImageFrame {
    bytes: Vec<u8>,
    pixels: image::RgbImage,
}

impl ImageFrame {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn pixels(&self) -> &image::RgbImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Write the JPEG exactly as received.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, &self.bytes)
    }
}

/// Validate and decode the bytes the scanner produced for the image
/// delimiter pair. The scanner already stopped at the end marker; this
/// re-checks both markers and lets the codec reject anything corrupt or
/// truncated in between.
pub fn assemble(raw: Vec<u8>) -> Result<ImageFrame, DecodeError> {
    if raw.len() < IMAGE_BEGIN.len() + IMAGE_END.len()
        || !raw.starts_with(&IMAGE_BEGIN)
        || !raw.ends_with(&IMAGE_END)
    {
        return Err(DecodeError::BadMarkers);
    }
    let pixels =
        image::load_from_memory_with_format(&raw, image::ImageFormat::Jpeg)?.to_rgb8();
    debug!(
        width = pixels.width(),
        height = pixels.height(),
        bytes = raw.len(),
        "image frame decoded"
    );
    Ok(ImageFrame { bytes: raw, pixels })
}
