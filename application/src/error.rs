use murmur_domain::DomainError;
use thiserror::Error;

use crate::upload::ChunkError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}
