use memesmith_contracts::image::EncodedImage;
use sha2::{Digest, Sha256};

use super::GenerativeClient;
use crate::error::{EditError, GenerationError};

const CAPTION_POOL: &[&str] = &[
    "When the code compiles on the first try",
    "Me pretending to understand the meeting",
    "That face when someone says it's a quick fix",
    "Monday, but make it personal",
    "Nobody:\nAbsolutely nobody:\nMe:",
    "This is fine. Everything is fine.",
    "Trust me, I read the documentation",
    "Working from home, day 400",
    "When the Wi-Fi drops for one second",
    "I have no idea what I'm doing and at this point I'm afraid to ask",
];

/// Offline client: deterministic captions, identity edits.
pub struct DryrunClient {
    caption_count: usize,
}

impl DryrunClient {
    pub fn new(caption_count: usize) -> Self {
        Self {
            caption_count: caption_count.clamp(1, CAPTION_POOL.len()),
        }
    }
}

impl GenerativeClient for DryrunClient {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn suggest_captions(&self, image: &EncodedImage) -> Result<Vec<String>, GenerationError> {
        let start = pool_offset(image.bytes());
        Ok((0..self.caption_count)
            .map(|idx| CAPTION_POOL[(start + idx) % CAPTION_POOL.len()].to_string())
            .collect())
    }

    fn apply_edit(
        &self,
        image: &EncodedImage,
        _instruction: &str,
    ) -> Result<EncodedImage, EditError> {
        Ok(image.clone())
    }
}

fn pool_offset(bytes: &[u8]) -> usize {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    usize::from(digest[0]) % CAPTION_POOL.len()
}
