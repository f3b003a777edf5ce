use crate::HasherError;

pub mod sha2;

pub trait Hasher: Send + Sync {
    fn hash(&self, input: &[u8]) -> Result<Vec<u8>, HasherError>;
    fn hash_base64_url(&self, input: &[u8]) -> Result<String, HasherError>;

    /// Digest size in bytes.
    fn digest_size(&self) -> usize;
}
