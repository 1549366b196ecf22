use std::fmt;
use std::path::PathBuf;

/// BLAKE3 digest of a file's full content.
///
/// Two files with the same fingerprint are treated as identical. BLAKE3 has
/// 128-bit collision resistance, so a false match is not a practical concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(blake3::Hash);

impl Fingerprint {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes))
    }

    pub fn to_hex(self) -> String {
        self.0.to_hex().to_string()
    }
}

impl From<blake3::Hash> for Fingerprint {
    fn from(hash: blake3::Hash) -> Self {
        Self(hash)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// A hashed file seen during one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub fingerprint: Fingerprint,
}

pub fn format_human_elapsed(elapsed: std::time::Duration) -> String {
    let elapsed_secs = elapsed.as_secs();
    let elapsed_subsec_millis = elapsed.subsec_millis();
    if elapsed_secs >= 3600 {
        // h:mm:ss
        let hours = elapsed_secs / 3600;
        let minutes = (elapsed_secs % 3600) / 60;
        let seconds = elapsed_secs % 60;
        format!("{hours}:{minutes:02}:{seconds:02}.{elapsed_subsec_millis:03} (h:mm:ss.mmm)")
    } else if elapsed_secs >= 60 {
        // m:ss
        let minutes = elapsed_secs / 60;
        let seconds = elapsed_secs % 60;
        format!("{minutes}:{seconds:02}.{elapsed_subsec_millis:03} (m:ss.mmm)")
    } else {
        format!("{}.{:03} seconds", elapsed_secs, elapsed_subsec_millis)
    }
}
