use sha2::{Digest, Sha256};

/// Short digest of a pane's captured contents, used only for change
/// detection: the first 8 bytes of SHA-256.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentFingerprint([u8; 8]);

impl ContentFingerprint {
    pub fn of(content: impl AsRef<[u8]>) -> Self {
        let hash = Sha256::digest(content.as_ref());
        let mut fp = [0u8; 8];
        fp.copy_from_slice(&hash[..8]);
        Self(fp)
    }
}

impl std::fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}
