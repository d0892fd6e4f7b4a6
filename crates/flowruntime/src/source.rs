//! Where flow conf bytes come from.
//!
//! The builder reads definitions by name through a [`ConfigReader`] and, when
//! one is configured, keeps the raw bytes in a [`ConfigCache`].

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default lifetime of cached conf bytes
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Source of raw flow conf bytes
pub trait ConfigReader: Send + Sync {
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;
}

/// Reads conf files from a directory
#[derive(Debug, Clone)]
pub struct FileConfigReader {
    dir: PathBuf,
}

impl FileConfigReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `name` as given, or with `.json` appended when it has no extension
    fn resolve(&self, name: &str) -> PathBuf {
        let path = self.dir.join(name);
        if path.extension().is_none() && !path.exists() {
            return path.with_extension("json");
        }
        path
    }
}

impl Default for FileConfigReader {
    fn default() -> Self {
        Self::new("./conf")
    }
}

impl ConfigReader for FileConfigReader {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self.resolve(name);
        tracing::debug!("Reading flow conf {} from {}", name, path.display());
        std::fs::read(&path)
    }
}

/// Conf definitions held in memory, keyed by name
#[derive(Debug, Default)]
pub struct MemoryConfigReader {
    definitions: HashMap<String, Vec<u8>>,
}

impl MemoryConfigReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.definitions.insert(name.into(), bytes.into());
    }

    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    /// Store a definition under its own name
    pub fn insert_definition(
        &mut self,
        definition: &flowcore::FlowDefinition,
    ) -> Result<(), serde_json::Error> {
        let bytes = serde_json::to_vec(definition)?;
        self.insert(definition.name.clone(), bytes);
        Ok(())
    }
}

impl ConfigReader for MemoryConfigReader {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        self.definitions.get(name).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("flow conf {} not found", name),
            )
        })
    }
}

/// Cache of raw conf bytes
pub trait ConfigCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store with the cache's default lifetime
    fn set_default(&self, key: &str, value: Vec<u8>);

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
}

/// In-process cache with lazy expiry
#[derive(Debug)]
pub struct MemoryConfigCache {
    default_ttl: Duration,
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryConfigCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .values()
            .filter(|(_, expires)| *expires > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Vec<u8>, Instant)>> {
        // The map stays consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryConfigCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl ConfigCache for MemoryConfigCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some((bytes, expires)) if *expires > Instant::now() => Some(bytes.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set_default(&self, key: &str, value: Vec<u8>) {
        self.set(key, value, self.default_ttl);
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        self.lock()
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }
}
