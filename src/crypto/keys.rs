//! Ed25519 key management for the v3 onion identity
//!
//! Key file format is a single line: `v3:` followed by the base64 seed.

use super::address;
use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Tag written before the seed in the key file
const V3_TAG: &str = "v3";

/// Long-term v3 onion identity
///
/// Immutable once built; the public key and expanded form are derived
/// from the seed.
#[derive(Clone)]
pub struct V3Key {
    signing_key: SigningKey,
}

impl V3Key {
    /// Create from raw seed bytes (32 bytes)
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Generate a fresh key from the OS CSPRNG
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    pub fn seed(&self) -> &[u8; 32] {
        self.signing_key.as_bytes()
    }

    /// Get raw public key bytes
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Service ID derived from the public key (no `.onion` suffix)
    pub fn service_id(&self) -> String {
        address::service_id(&self.public_key_bytes())
    }

    /// Full onion hostname
    pub fn onion_address(&self) -> String {
        format!("{}.onion", self.service_id())
    }

    /// Expanded key blob for `ADD_ONION ED25519-V3:<blob>`
    pub fn expanded_key_base64(&self) -> String {
        address::expanded_key_base64(self.seed())
    }

    /// Text form stored on disk
    fn to_file_contents(&self) -> String {
        format!("{}:{}", V3_TAG, STANDARD.encode(self.seed()))
    }

    fn from_file_contents(path: &Path, contents: &str) -> Result<Self> {
        let (tag, encoded) = contents
            .trim()
            .split_once(':')
            .ok_or_else(|| Error::format(path, "missing key type tag"))?;

        if tag != V3_TAG {
            return Err(Error::format(
                path,
                format!("unsupported key type {:?} (expected {:?})", tag, V3_TAG),
            ));
        }

        let seed = STANDARD
            .decode(encoded)
            .map_err(|e| Error::format(path, format!("bad base64 seed: {}", e)))?;
        let seed: [u8; 32] = seed.as_slice().try_into().map_err(|_| {
            Error::format(path, format!("seed is {} bytes (expected 32)", seed.len()))
        })?;

        Ok(Self::from_seed(&seed))
    }
}

impl fmt::Debug for V3Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("V3Key")
            .field("service_id", &self.service_id())
            .finish_non_exhaustive()
    }
}

/// File-backed store for the onion identity key
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generate a new key pair
    pub fn generate() -> V3Key {
        V3Key::generate()
    }

    /// Read and parse the key file
    ///
    /// A missing file is reported as [`Error::NotFound`] so callers can
    /// fall back to generating a key.
    pub fn load(&self) -> Result<V3Key> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(self.path.clone()));
            },
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(Error::format(&self.path, "key file is not UTF-8"));
            },
            Err(source) => {
                return Err(Error::KeyIo {
                    path: self.path.clone(),
                    source,
                });
            },
        };

        let key = V3Key::from_file_contents(&self.path, &contents)?;
        debug!("Loaded onion key from {:?}", self.path);
        Ok(key)
    }

    /// Write the key file, replacing any existing one
    ///
    /// Contents go to a sibling temp file first and are renamed into place.
    pub fn persist(&self, key: &V3Key) -> Result<()> {
        let tmp_path = self.temp_path();
        let io_err = |source| Error::KeyIo {
            path: self.path.clone(),
            source,
        };

        {
            let mut file = open_private(&tmp_path).map_err(io_err)?;
            file.write_all(key.to_file_contents().as_bytes())
                .map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&tmp_path, &self.path).map_err(io_err)?;

        info!("Saved onion key to {:?}", self.path);
        Ok(())
    }

    /// Load the key, or generate and persist one when the file is absent
    pub fn load_or_generate(&self) -> Result<V3Key> {
        match self.load() {
            Ok(key) => Ok(key),
            Err(Error::NotFound(_)) => {
                info!("No onion key at {:?}, generating a new one", self.path);
                let key = Self::generate();
                self.persist(&key)?;
                Ok(key)
            },
            Err(e) => Err(e),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    fs::File::create(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC8032_SEED: [u8; 32] = [
        0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60, 0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec, 0x2c,
        0xc4, 0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19, 0x70, 0x3b, 0xac, 0x03, 0x1c, 0xae,
        0x7f, 0x60,
    ];

    fn store_in(dir: &tempfile::TempDir) -> KeyStore {
        KeyStore::new(dir.path().join("onion.key"))
    }

    #[test]
    fn test_known_seed_identity() {
        let key = V3Key::from_seed(&RFC8032_SEED);
        assert_eq!(
            hex::encode(key.public_key_bytes()),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );
        assert_eq!(
            key.onion_address(),
            "25njqamcweflpvkl73j4szahhihoc4xt3ktcgjnpaingr5yhkenl5sid.onion"
        );
        assert_eq!(
            key.to_file_contents(),
            "v3:nWGxne/9WmC6hEr0kuwsxERJxWl7MmkZcDusAxyuf2A="
        );
    }

    #[test]
    fn test_persist_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let key = KeyStore::generate();

        store.persist(&key).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.seed(), key.seed());
        assert_eq!(loaded.public_key_bytes(), key.public_key_bytes());
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_persist_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.persist(&KeyStore::generate()).unwrap();
        let second = KeyStore::generate();
        store.persist(&second).unwrap();

        assert_eq!(store.load().unwrap().seed(), second.seed());
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.persist(&KeyStore::generate()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = store_in(&dir).load().unwrap_err();
        assert!(err.is_not_found(), "got {:?}", err);
    }

    #[test]
    fn test_load_trims_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            "  v3:nWGxne/9WmC6hEr0kuwsxERJxWl7MmkZcDusAxyuf2A=\n\n",
        )
        .unwrap();

        assert_eq!(store.load().unwrap().seed(), &RFC8032_SEED);
    }

    #[test]
    fn test_load_rejects_bad_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        for contents in [
            "v2:nWGxne/9WmC6hEr0kuwsxERJxWl7MmkZcDusAxyuf2A=",
            "nWGxne/9WmC6hEr0kuwsxERJxWl7MmkZcDusAxyuf2A=",
            "v3:not base64!",
            "v3:AAAA",
            "",
        ] {
            fs::write(store.path(), contents).unwrap();
            let err = store.load().unwrap_err();
            assert!(
                matches!(err, Error::Format { .. }),
                "{:?} gave {:?}",
                contents,
                err
            );
        }
    }

    #[test]
    fn test_load_or_generate_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let first = store.load_or_generate().unwrap();
        assert!(store.path().exists());
        let second = store.load_or_generate().unwrap();

        assert_eq!(first.service_id(), second.service_id());
    }

    #[test]
    fn test_load_or_generate_keeps_format_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "garbage").unwrap();

        assert!(matches!(
            store.load_or_generate(),
            Err(Error::Format { .. })
        ));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "garbage");
    }

    #[test]
    fn test_debug_hides_seed() {
        let key = V3Key::from_seed(&RFC8032_SEED);
        let shown = format!("{:?}", key);
        assert!(shown.contains("25njqamc"));
        assert!(!shown.contains("nWGxne"));
    }
}
