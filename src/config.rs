//! Range-validated configuration settings with change notification.
//!
//! The store holds named numeric settings, each bound once with a default,
//! a valid range, and a description. Writes are clamped into the declared
//! range and fan out to registered subscribers, which is how the derived
//! value cache learns that it must recompute. Consumers must not assume raw
//! values fall into a safe sub-range relative to each other; ordering
//! between settings is enforced downstream, at derivation time.
//!
//! Single writer (the host's settings UI), many readers. The store is
//! passed into the core at construction; nothing here is a global.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::{Error, Result};

type Subscriber = Arc<dyn Fn(&ConfigStore) + Send + Sync>;

#[derive(Debug, Clone)]
struct Setting {
    value: f64,
    range: RangeInclusive<f64>,
    description: String,
}

/// Typed, named, range-validated numeric settings with subscriber
/// notification.
pub struct ConfigStore {
    enabled: AtomicBool,
    settings: RwLock<HashMap<String, Setting>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ConfigStore {
    /// Creates an empty store with the master switch on.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            settings: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Whether the whole patch set is enabled.
    ///
    /// Hooks become no-ops when this is off; patch installation is
    /// unaffected (the providers keep answering, hosts gate at the hook).
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Flips the master switch.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Binds a setting with a default value, valid range, and description.
    ///
    /// The default is clamped into the range, like any other write. A NaN
    /// default falls back to the range start, since NaN survives a clamp.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateSetting`] when `key` is already bound.
    pub fn bind(
        &self,
        key: impl Into<String>,
        default: f64,
        range: RangeInclusive<f64>,
        description: impl Into<String>,
    ) -> Result<()> {
        let key = key.into();
        let mut settings = write_lock(&self.settings);
        if settings.contains_key(&key) {
            return Err(Error::DuplicateSetting(key));
        }
        let value = if default.is_nan() {
            *range.start()
        } else {
            default.clamp(*range.start(), *range.end())
        };
        settings.insert(
            key,
            Setting {
                value,
                range,
                description: description.into(),
            },
        );
        Ok(())
    }

    /// Reads the current value of a setting.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownSetting`] when `key` was never bound.
    pub fn get(&self, key: &str) -> Result<f64> {
        read_lock(&self.settings)
            .get(key)
            .map(|setting| setting.value)
            .ok_or_else(|| Error::UnknownSetting(key.to_string()))
    }

    /// Writes a setting, clamping into its declared range, and notifies
    /// subscribers when the stored value actually changed.
    ///
    /// A NaN write keeps the prior value: NaN survives a range clamp and
    /// would poison everything derived from the setting downstream.
    ///
    /// Returns the clamped value that was stored.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownSetting`] when `key` was never bound.
    pub fn set(&self, key: &str, value: f64) -> Result<f64> {
        let (stored, changed) = {
            let mut settings = write_lock(&self.settings);
            let setting = settings
                .get_mut(key)
                .ok_or_else(|| Error::UnknownSetting(key.to_string()))?;
            let clamped = if value.is_nan() {
                setting.value
            } else {
                value.clamp(*setting.range.start(), *setting.range.end())
            };
            let changed = clamped != setting.value;
            setting.value = clamped;
            (clamped, changed)
        };
        if changed {
            self.notify();
        }
        Ok(stored)
    }

    /// The description a setting was bound with, for a host's settings UI.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownSetting`] when `key` was never bound.
    pub fn describe(&self, key: &str) -> Result<String> {
        read_lock(&self.settings)
            .get(key)
            .map(|setting| setting.description.clone())
            .ok_or_else(|| Error::UnknownSetting(key.to_string()))
    }

    /// Registers a change subscriber, invoked after every effective write.
    pub fn subscribe(&self, subscriber: impl Fn(&ConfigStore) + Send + Sync + 'static) {
        lock_subscribers(&self.subscribers).push(Arc::new(subscriber));
    }

    fn notify(&self) {
        // Both locks are released before any callback runs: the settings
        // lock in `set`, and the subscriber list here by cloning it out.
        // Subscribers are therefore free to re-enter the store, including
        // `subscribe` and further writes.
        let subscribers: Vec<Subscriber> = lock_subscribers(&self.subscribers).clone();
        for subscriber in &subscribers {
            subscriber(self);
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("enabled", &self.enabled())
            .field("settings", &*read_lock(&self.settings))
            .finish_non_exhaustive()
    }
}

// A poisoned lock still holds a consistent map; recover the guard rather
// than propagating a panic from some other thread into this one.
fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn lock_subscribers<T>(lock: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|e| e.into_inner())
}
