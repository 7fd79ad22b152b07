//! Client modules for external API interactions

pub mod attachment_client;
pub mod profile_store;

pub use attachment_client::HttpAttachmentFetcher;
pub use profile_store::StaticProfileStore;
