use super::algorithm::Algorithm;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::trace;

pub const DEFAULT_CHUNK_SIZE: usize = 8192; // 8KB

/// Result of hashing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashOutcome {
    /// Lowercase hex digest.
    pub digest: String,
    /// Bytes fed to the hash. Less than the stat size if the file shrank
    /// while it was being read.
    pub bytes_hashed: u64,
}

/// Streams a file through an incremental hash in fixed-size chunks.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedHasher {
    algorithm: Algorithm,
    chunk_size: usize,
}

impl Default for ChunkedHasher {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkedHasher {
    pub fn new(algorithm: Algorithm, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize(chunk_size));
        }
        Ok(Self {
            algorithm,
            chunk_size,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Hash an in-memory buffer in one pass.
    pub fn hash_bytes(&self, data: &[u8]) -> String {
        let mut acc = self.algorithm.accumulator();
        acc.update(data);
        acc.finalize_hex()
    }

    /// Hash exactly `size` bytes from `reader`, one chunk at a time.
    ///
    /// Each chunk is `min(chunk_size, remaining)` bytes and is filled with a
    /// read loop, so readers that return short reads hash the same as ones
    /// that don't. Stops early at EOF.
    pub fn hash_reader<R: Read>(&self, mut reader: R, size: u64) -> io::Result<HashOutcome> {
        let mut acc = self.algorithm.accumulator();
        let mut buffer = vec![0u8; block_len(self.chunk_size, size)];
        let mut remaining = size;
        let mut hashed = 0u64;

        while remaining > 0 {
            let block = block_len(self.chunk_size, remaining);
            let filled = fill_block(&mut reader, &mut buffer[..block])?;
            acc.update(&buffer[..filled]);
            hashed += filled as u64;
            remaining -= filled as u64;

            if filled < block {
                trace!(expected = size, hashed, "EOF before expected size");
                break;
            }
        }

        Ok(HashOutcome {
            digest: acc.finalize_hex(),
            bytes_hashed: hashed,
        })
    }

    /// Open, stat, and hash a file. The handle is closed before returning.
    pub fn hash_file(&self, path: &Path) -> io::Result<HashOutcome> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        self.hash_reader(file, size)
    }
}

fn block_len(chunk_size: usize, remaining: u64) -> usize {
    usize::try_from(remaining).map_or(chunk_size, |r| r.min(chunk_size))
}

/// Read until `buf` is full or EOF. Returns the number of bytes read.
fn fill_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    const SHA1_EMPTY: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
    const BLAKE3_EMPTY: &str = "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262";

    /// Hands out at most `max` bytes per read and interrupts every other call.
    struct StingyReader {
        inner: Cursor<Vec<u8>>,
        max: usize,
        interrupt_next: bool,
    }

    impl Read for StingyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "try again"));
            }
            self.interrupt_next = true;
            let n = buf.len().min(self.max);
            self.inner.read(&mut buf[..n])
        }
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            ChunkedHasher::new(Algorithm::Sha1, 0),
            Err(Error::InvalidChunkSize(0))
        ));
    }

    #[test]
    fn test_empty_input_digests() {
        let sha1 = ChunkedHasher::default();
        let outcome = sha1.hash_reader(io::empty(), 0).unwrap();
        assert_eq!(outcome.digest, SHA1_EMPTY);
        assert_eq!(outcome.bytes_hashed, 0);

        let blake3 = ChunkedHasher::new(Algorithm::Blake3, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(blake3.hash_reader(io::empty(), 0).unwrap().digest, BLAKE3_EMPTY);
    }

    #[test]
    fn test_known_sha1_digests() {
        let hasher = ChunkedHasher::default();
        assert_eq!(hasher.hash_bytes(b"x"), "11f6ad8ec52a2984abaafd7c3b516503785c2072");
        assert_eq!(
            hasher.hash_bytes(b"hello world"),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
    }

    #[test]
    fn test_chunk_size_does_not_change_digest() {
        let data = sample(20_000);
        for algorithm in [Algorithm::Sha1, Algorithm::Blake3] {
            let expected = ChunkedHasher::new(algorithm, 1).unwrap().hash_bytes(&data);
            for chunk_size in [1, DEFAULT_CHUNK_SIZE, data.len() + 1] {
                let hasher = ChunkedHasher::new(algorithm, chunk_size).unwrap();
                let outcome = hasher
                    .hash_reader(Cursor::new(data.clone()), data.len() as u64)
                    .unwrap();
                assert_eq!(outcome.digest, expected, "{algorithm} chunk {chunk_size}");
                assert_eq!(outcome.digest.len(), algorithm.hex_len());
                assert_eq!(outcome.bytes_hashed, data.len() as u64);
            }
        }
    }

    #[test]
    fn test_short_reads_are_accumulated() {
        let data = sample(10_000);
        let hasher = ChunkedHasher::default();
        let reader = StingyReader {
            inner: Cursor::new(data.clone()),
            max: 7,
            interrupt_next: true,
        };
        let outcome = hasher.hash_reader(reader, data.len() as u64).unwrap();
        assert_eq!(outcome.digest, hasher.hash_bytes(&data));
        assert_eq!(outcome.bytes_hashed, data.len() as u64);
    }

    #[test]
    fn test_early_eof_hashes_what_was_read() {
        let data = sample(100);
        let hasher = ChunkedHasher::new(Algorithm::Sha1, 16).unwrap();
        let outcome = hasher.hash_reader(Cursor::new(data.clone()), 1_000).unwrap();
        assert_eq!(outcome.bytes_hashed, 100);
        assert_eq!(outcome.digest, hasher.hash_bytes(&data));
    }

    #[test]
    fn test_bytes_past_size_are_ignored() {
        let data = sample(300);
        let hasher = ChunkedHasher::new(Algorithm::Sha1, 64).unwrap();
        let outcome = hasher.hash_reader(Cursor::new(data.clone()), 200).unwrap();
        assert_eq!(outcome.digest, hasher.hash_bytes(&data[..200]));
    }

    #[test]
    fn test_hash_file_matches_hash_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data = sample(DEFAULT_CHUNK_SIZE * 3 + 5);
        std::fs::write(&path, &data).unwrap();

        let hasher = ChunkedHasher::default();
        let outcome = hasher.hash_file(&path).unwrap();
        assert_eq!(outcome.digest, hasher.hash_bytes(&data));

        let empty = dir.path().join("empty");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(hasher.hash_file(&empty).unwrap().digest, SHA1_EMPTY);
    }

    #[test]
    fn test_hash_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = ChunkedHasher::default()
            .hash_file(&dir.path().join("nope"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        #[test]
        fn prop_digest_independent_of_chunk_size(
            data in prop::collection::vec(any::<u8>(), 0..4096),
            chunk_size in 1usize..5000,
        ) {
            let hasher = ChunkedHasher::new(Algorithm::Sha1, chunk_size).unwrap();
            let outcome = hasher.hash_reader(Cursor::new(data.clone()), data.len() as u64).unwrap();
            prop_assert_eq!(outcome.digest, hasher.hash_bytes(&data));
        }
    }
}
