//! SHA-256 content hashing for tamper evidence.
//!
//! Row hashes are computed over every field except `integrity_hash`,
//! serialized as JSON with keys in sorted order, and truncated to 16 hex
//! characters. Checkpoint digests cover the whole file.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Length of a row `integrity_hash`.
pub const ROW_HASH_LEN: usize = 16;

/// Hashable view of one row log entry.
///
/// Field order is alphabetical so the serialized JSON has sorted keys.
#[derive(Serialize)]
pub struct HashableRow<'a> {
    pub action: &'a str,
    pub actor: &'a str,
    pub compliance_tags: &'a str,
    pub detail: &'a str,
    pub risk_level: &'a str,
    pub session_id: &'a str,
    pub source_ip: &'a str,
    pub ts: &'a str,
}

/// Compute the truncated integrity hash of a row.
pub fn compute_row_hash(row: &HashableRow<'_>) -> String {
    let json = serde_json::to_vec(row).expect("Row serialization should not fail");
    let digest = hex::encode(Sha256::digest(&json));
    digest[..ROW_HASH_LEN].to_string()
}

/// Hex SHA-256 of a file's bytes, read in chunks.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
