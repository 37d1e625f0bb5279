pub mod format;
pub mod signing;
pub mod store;

pub use format::ImageFormat;
pub use signing::{SignatureError, SignedUrl, UrlSigner};
pub use store::{BlobEntry, PhotoStore, StoredBlob};
