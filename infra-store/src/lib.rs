pub mod media;
pub mod metadata;

pub use media::FsMediaStore;
pub use metadata::FsMetadataStore;
