use uuid::Uuid;

/// Image types accepted for upload, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Heic,
    Heif,
    Gif,
}

impl ImageFormat {
    /// Resolve from the extension of a client-supplied file name.
    /// Case-insensitive; `None` for anything not on the list.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.trim().rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "heic" => Some(Self::Heic),
            "heif" => Some(Self::Heif),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Heic => "heic",
            Self::Heif => "heif",
            Self::Gif => "gif",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Heic => "image/heic",
            Self::Heif => "image/heif",
            Self::Gif => "image/gif",
        }
    }
}

/// `{event_id}/{guest_id}/{photo_id}.{ext}`
pub fn photo_path(event_id: Uuid, guest_id: Uuid, photo_id: Uuid, format: ImageFormat) -> String {
    format!("{}/{}/{}.{}", event_id, guest_id, photo_id, format.extension())
}

/// `{event_id}/cover-{cover_id}.{ext}`
pub fn cover_path(event_id: Uuid, cover_id: Uuid, format: ImageFormat) -> String {
    format!("{}/cover-{}.{}", event_id, cover_id, format.extension())
}
