use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn sha256_reader_hex<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 64 * 1024];
    loop {
        let read = reader
            .read(&mut buffer)
            .context("failed reading data for sha256")?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_file_hex(path: &Path) -> Result<String> {
    let file =
        File::open(path).with_context(|| format!("failed to open {} for sha256", path.display()))?;
    let mut reader = BufReader::new(file);
    sha256_reader_hex(&mut reader).with_context(|| format!("failed to hash {}", path.display()))
}

/// Compares against a hex digest, ignoring case and surrounding whitespace.
pub fn verify_sha256(bytes: &[u8], expected_hex: &str) -> bool {
    digest_matches(&sha256_hex(bytes), expected_hex)
}

pub fn verify_sha256_reader<R: Read>(reader: &mut R, expected_hex: &str) -> Result<bool> {
    Ok(digest_matches(&sha256_reader_hex(reader)?, expected_hex))
}

pub fn verify_sha256_file(path: &Path, expected_hex: &str) -> Result<bool> {
    Ok(digest_matches(&sha256_file_hex(path)?, expected_hex))
}

fn digest_matches(actual_hex: &str, expected_hex: &str) -> bool {
    actual_hex.eq_ignore_ascii_case(expected_hex.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn sha256_hex_matches_known_vectors() {
        assert_eq!(sha256_hex(b""), EMPTY_SHA256);
        assert_eq!(sha256_hex(b"abc"), ABC_SHA256);
    }

    #[test]
    fn verify_sha256_ignores_hex_case() {
        assert!(verify_sha256(b"abc", &ABC_SHA256.to_ascii_uppercase()));
        assert!(verify_sha256(b"abc", &format!(" {ABC_SHA256}\n")));
        assert!(!verify_sha256(b"abd", ABC_SHA256));
    }

    #[test]
    fn verify_sha256_reader_streams_input() {
        let mut reader = std::io::Cursor::new(b"abc".to_vec());
        assert!(verify_sha256_reader(&mut reader, ABC_SHA256).expect("must hash reader"));
    }

    #[test]
    fn verify_sha256_file_reports_missing_file() {
        let path = std::env::temp_dir().join(format!(
            "pkg-security-missing-{}-{}",
            std::process::id(),
            line!()
        ));
        let err = verify_sha256_file(&path, EMPTY_SHA256).expect_err("missing file must fail");
        assert!(err.to_string().contains("failed to open"), "unexpected error: {err}");
    }

    #[test]
    fn verify_sha256_file_hashes_contents() {
        let path = std::env::temp_dir().join(format!(
            "pkg-security-file-{}-{}",
            std::process::id(),
            line!()
        ));
        std::fs::write(&path, b"abc").expect("must write fixture");
        assert!(verify_sha256_file(&path, ABC_SHA256).expect("must hash file"));
        assert_eq!(sha256_file_hex(&path).expect("must hash file"), ABC_SHA256);
        let _ = std::fs::remove_file(&path);
    }
}
