use ct_codecs::{Base64UrlSafeNoPadding, Encoder};
use sha2::{Digest, Sha256, Sha384, Sha512};

use super::Hasher;
use crate::HasherError;

pub struct Sha256Hasher {}
pub struct Sha384Hasher {}
pub struct Sha512Hasher {}

macro_rules! impl_sha_hasher {
    ($hasher:ty, $digest:ty, $size:expr) => {
        impl Hasher for $hasher {
            fn hash(&self, input: &[u8]) -> Result<Vec<u8>, HasherError> {
                Ok(<$digest>::digest(input).to_vec())
            }

            fn hash_base64_url(&self, input: &[u8]) -> Result<String, HasherError> {
                Base64UrlSafeNoPadding::encode_to_string(self.hash(input)?)
                    .map_err(|e| HasherError::CouldNotHash(e.to_string()))
            }

            fn digest_size(&self) -> usize {
                $size
            }
        }
    };
}

impl_sha_hasher!(Sha256Hasher, Sha256, 32);
impl_sha_hasher!(Sha384Hasher, Sha384, 48);
impl_sha_hasher!(Sha512Hasher, Sha512, 64);
