//! Persistent preference storage
//!
//! Values are kept in a key / value [`Store`] as raw bytes. Keys are derived
//! per physical device from its serial number so that several sensors can share
//! one store.
//!
//! Copyright 2019 Ryan Kurte

use std::collections::HashMap;

use crate::baseline::Baseline;

/// Preference hash used when the serial number cannot be read
pub const FALLBACK_PREFERENCE_HASH: u32 = 0x6181_DEAD;

/// Key / value persistence provided by the host
pub trait Store {
    /// Load a value, `None` if absent
    fn load(&mut self, key: u32) -> Option<Vec<u8>>;
    /// Save a value, returning whether the write succeeded
    fn save(&mut self, key: u32, value: &[u8]) -> bool;
}

/// Values that can be persisted to a [`Store`]
pub trait Preference: Sized {
    fn encode(&self) -> Vec<u8>;
    fn decode(raw: &[u8]) -> Option<Self>;
}

impl Preference for f32 {
    fn encode(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        let b: [u8; 4] = raw.try_into().ok()?;
        Some(f32::from_be_bytes(b))
    }
}

impl Preference for bool {
    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        match raw {
            [0] => Some(false),
            [1] => Some(true),
            _ => None,
        }
    }
}

impl Preference for Baseline {
    fn encode(&self) -> Vec<u8> {
        let mut v = self.state0.to_be_bytes().to_vec();
        v.extend_from_slice(&self.state1.to_be_bytes());
        v
    }

    fn decode(raw: &[u8]) -> Option<Self> {
        if raw.len() != 8 {
            return None;
        }
        let s0: [u8; 4] = raw[..4].try_into().ok()?;
        let s1: [u8; 4] = raw[4..].try_into().ok()?;

        Some(Baseline {
            state0: i32::from_be_bytes(s0),
            state1: i32::from_be_bytes(s1),
        })
    }
}

/// Persisted values, the discriminant is the offset from the device hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceKey {
    VocBaseline = 2,
    AutoSelfCalibration = 3,
    AutoCleaning = 4,
    Altitude = 5,
    AmbientPressure = 6,
    TemperatureOffset = 7,
    Co2Reference = 8,
}

/// Derive the per-device preference hash from the first four serial number bytes
pub fn preference_hash(serial: &[u8]) -> u32 {
    let mut b = [0u8; 4];
    for (d, s) in b.iter_mut().zip(serial.iter()) {
        *d = *s;
    }
    u32::from_be_bytes(b)
}

/// Typed access to a [`Store`] for one device
pub struct Preferences<S> {
    store: S,
    hash: u32,
}

impl <S: Store> Preferences<S> {
    pub fn new(store: S) -> Self {
        Preferences{ store, hash: FALLBACK_PREFERENCE_HASH }
    }

    pub fn set_hash(&mut self, hash: u32) {
        self.hash = hash;
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn key(&self, key: PreferenceKey) -> u32 {
        self.hash.wrapping_add(key as u32)
    }

    pub fn load<T: Preference>(&mut self, key: PreferenceKey) -> Option<T> {
        let k = self.key(key);
        let raw = self.store.load(k)?;

        let v = T::decode(&raw);
        if v.is_none() {
            warn!("Ignoring malformed preference {:?} ({} bytes)", key, raw.len());
        }
        v
    }

    /// Load a float, treating the NaN "not set" sentinel as absent
    pub fn load_value(&mut self, key: PreferenceKey) -> Option<f32> {
        self.load::<f32>(key).filter(|v| !v.is_nan())
    }

    pub fn save<T: Preference>(&mut self, key: PreferenceKey, value: &T) -> bool {
        let k = self.key(key);
        let ok = self.store.save(k, &value.encode());
        if !ok {
            warn!("Could not persist preference {:?}", key);
        }
        ok
    }

    /// Invalidate compensation values and restore switch defaults
    pub fn reset(&mut self) {
        for k in [PreferenceKey::Altitude, PreferenceKey::AmbientPressure, PreferenceKey::TemperatureOffset].iter() {
            if self.save(*k, &f32::NAN) {
                debug!("Invalidated {:?} preference", k);
            }
        }

        if self.save(PreferenceKey::AutoSelfCalibration, &true) {
            debug!("Reset CO2 ASC preference to enabled");
        }
        if self.save(PreferenceKey::AutoCleaning, &false) {
            debug!("Reset auto cleaning preference to disabled");
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// In-memory store, for tests and hosts without non-volatile storage
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<u32, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: u32) -> bool {
        self.values.contains_key(&key)
    }

    pub fn get(&self, key: u32) -> Option<&[u8]> {
        self.values.get(&key).map(|v| v.as_slice())
    }
}

impl Store for MemoryStore {
    fn load(&mut self, key: u32) -> Option<Vec<u8>> {
        self.values.get(&key).cloned()
    }

    fn save(&mut self, key: u32, value: &[u8]) -> bool {
        self.values.insert(key, value.to_vec());
        true
    }
}

impl <S: Store> Store for &mut S {
    fn load(&mut self, key: u32) -> Option<Vec<u8>> {
        (**self).load(key)
    }

    fn save(&mut self, key: u32, value: &[u8]) -> bool {
        (**self).save(key, value)
    }
}

#[cfg(feature = "util")]
pub use self::file::FileStore;

#[cfg(feature = "util")]
mod file {
    use std::collections::BTreeMap;
    use std::fs::File;
    use std::io::{BufReader, BufWriter};
    use std::path::PathBuf;

    use super::Store;

    /// JSON file backed store, rewritten on every save
    pub struct FileStore {
        path: PathBuf,
        values: BTreeMap<String, Vec<u8>>,
    }

    impl FileStore {
        /// Open a store, a missing file is treated as empty
        pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, std::io::Error> {
            let path = path.into();

            let values = match File::open(&path) {
                Ok(f) => serde_json::from_reader(BufReader::new(f))
                    .map_err(std::io::Error::from)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
                Err(e) => return Err(e),
            };

            Ok(FileStore{ path, values })
        }

        fn flush(&self) -> Result<(), std::io::Error> {
            let f = File::create(&self.path)?;
            serde_json::to_writer_pretty(BufWriter::new(f), &self.values)
                .map_err(std::io::Error::from)
        }
    }

    impl Store for FileStore {
        fn load(&mut self, key: u32) -> Option<Vec<u8>> {
            self.values.get(&format!("{:08x}", key)).cloned()
        }

        fn save(&mut self, key: u32, value: &[u8]) -> bool {
            self.values.insert(format!("{:08x}", key), value.to_vec());

            match self.flush() {
                Ok(_) => true,
                Err(e) => {
                    warn!("Error writing preferences to '{}': {:?}", self.path.display(), e);
                    false
                }
            }
        }
    }
}
