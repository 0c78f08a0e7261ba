//! Offline generators that need no credentials.
//!
//! They render deterministic stand-in media locally so the rest of the system
//! can be exercised without a vendor account.

mod canvas;
mod image;
mod video;

pub use self::image::PlaceholderImageGenerator;
pub use canvas::{accent_color, prompt_fingerprint};
pub use video::{frame_count, render_frames, PlaceholderVideoDriver, FPS, MAX_FRAMES};

/// Errors while rendering placeholder media.
#[derive(Debug, thiserror::Error)]
pub enum PlaceholderError {
    #[error("image error: {0}")]
    Image(#[from] ::image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("render worker failed: {0}")]
    Worker(String),
}
