use sha2::{Digest, Sha256};

pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// First 12 hex characters, enough to tell uploads apart in logs.
pub fn short_digest(data: &[u8]) -> String {
    let mut digest = calculate_sha256(data);
    digest.truncate(12);
    digest
}
