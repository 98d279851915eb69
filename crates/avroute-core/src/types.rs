/*!
 * Core data types for avroute.
 *
 * This module defines the identifier and localisation types shared by the
 * driver registry and its callers.
 */
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stable identifier for a device driver.
///
/// Identifiers are persisted by callers next to each device's location, so a
/// driver keeps the same id for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(Uuid);

impl DriverId {
    /// Create an id from a 128-bit constant; usable in `const` items.
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Create a random id
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DriverId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl From<Uuid> for DriverId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Locale used when a requested locale has no entry.
pub const FALLBACK_LOCALE: &str = "en";

/// Values keyed by locale tag (`en`, `en-GB`, `ja`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Localized<T> {
    entries: BTreeMap<String, T>,
}

impl<T> Localized<T> {
    /// Create an empty set of localised values
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add a value for a locale
    pub fn with<S: Into<String>>(mut self, locale: S, value: T) -> Self {
        self.entries.insert(locale.into(), value);
        self
    }

    /// Look up a locale, falling back to its language and then to English.
    ///
    /// `en-GB` resolves to `en-GB`, then `en`. Anything still missing
    /// resolves to the first entry so a caller always gets a value when one exists.
    pub fn get(&self, locale: &str) -> Option<&T> {
        if let Some(value) = self.entries.get(locale) {
            return Some(value);
        }
        if let Some((language, _)) = locale.split_once('-') {
            if let Some(value) = self.entries.get(language) {
                return Some(value);
            }
        }
        self.entries
            .get(FALLBACK_LOCALE)
            .or_else(|| self.entries.values().next())
    }

    /// Iterate over all locale/value pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of locales
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no locale has a value
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
