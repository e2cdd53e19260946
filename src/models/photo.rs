//! Values delivered to photo consumers

use std::sync::Arc;

use image::DynamicImage;

/// What a consumer receives for a request.
#[derive(Debug, Clone)]
pub enum Photo {
    /// A decoded, display-ready image
    Image(Arc<DynamicImage>),
    /// No photo available; show the default picture
    Placeholder,
}

impl Photo {
    /// Whether this is the placeholder
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }

    /// Get the decoded image, if any
    pub fn image(&self) -> Option<&Arc<DynamicImage>> {
        match self {
            Self::Image(image) => Some(image),
            Self::Placeholder => None,
        }
    }

    /// Image dimensions, if any
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image().map(|img| (img.width(), img.height()))
    }
}
