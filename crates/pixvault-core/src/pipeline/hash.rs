//! Content digests for stored originals.

use blake3::Hasher as Blake3Hasher;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// BLAKE3 content hashing.
pub struct Hasher;

impl Hasher {
    /// Hash a file on disk.
    ///
    /// Streams the file so edited originals are not loaded twice.
    pub fn content_hash(path: &Path) -> std::io::Result<String> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut hasher = Blake3Hasher::new();

        let mut buffer = [0u8; 65536];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hasher.finalize().to_hex().to_string())
    }

    /// Hash an in-memory upload buffer.
    pub fn content_hash_from_bytes(data: &[u8]) -> String {
        let mut hasher = Blake3Hasher::new();
        hasher.update(data);
        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_and_buffer_digests_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let from_file = Hasher::content_hash(&path).unwrap();
        assert_eq!(from_file, Hasher::content_hash_from_bytes(&data));
        assert_eq!(from_file.len(), 64);
    }

    #[test]
    fn test_digest_changes_with_content() {
        assert_ne!(
            Hasher::content_hash_from_bytes(b"a"),
            Hasher::content_hash_from_bytes(b"b")
        );
    }
}
