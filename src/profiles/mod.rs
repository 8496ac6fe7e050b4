// Profile store
// Named metadata filters in `profiles.toml` plus the persisted current-profile pointer


use anyhow::Context;
use itertools::Itertools;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Config;
use crate::database::{FilterField, MetadataFilter};
use crate::{RagError, Result};

/// Reserved profile name meaning "no filter"
pub const ALL_PROFILE: &str = "all";

/// Exact-match constraints a profile places on chunk metadata.
///
/// Values may be written as strings or bare numbers (`version = 15`); both
/// compare as text against chunk metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileFilter {
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub framework: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub lang: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
}

fn scalar_as_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
            Scalar::Text(text) => text,
            Scalar::Integer(number) => number.to_string(),
            // `3.0` keeps its decimal point
            Scalar::Float(number) => format!("{:?}", number),
        }),
    )
}

impl ProfileFilter {
    fn fields(&self) -> [(FilterField, Option<&str>); 3] {
        [
            (FilterField::Framework, self.framework.as_deref()),
            (FilterField::Version, self.version.as_deref()),
            (FilterField::Lang, self.lang.as_deref()),
        ]
    }

    /// True when no field carries a non-empty value
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields()
            .iter()
            .all(|(_, value)| value.is_none_or(str::is_empty))
    }

    /// `framework=nextjs, version=15` style summary, `no filter` when empty
    #[inline]
    pub fn describe(&self) -> String {
        let described = self
            .fields()
            .iter()
            .filter_map(|(field, value)| {
                value
                    .filter(|v| !v.is_empty())
                    .map(|v| format!("{}={}", field.column(), v))
            })
            .join(", ");

        if described.is_empty() {
            "no filter".to_string()
        } else {
            described
        }
    }
}

/// Compile an optional profile into a metadata filter.
///
/// `None` and a profile without values both produce the match-all filter.
#[inline]
pub fn build_filter(profile: Option<&ProfileFilter>) -> MetadataFilter {
    profile.map_or_else(MetadataFilter::match_all, |profile| {
        profile
            .fields()
            .into_iter()
            .fold(MetadataFilter::match_all(), |filter, (field, value)| {
                match value {
                    Some(value) => filter.with(field, value),
                    None => filter,
                }
            })
    })
}

/// Map a user-supplied profile name to a selection; `all` and blank mean none
#[inline]
pub fn parse_selection(name: &str) -> Option<&str> {
    let name = name.trim();
    if name.is_empty() || name == ALL_PROFILE {
        None
    } else {
        Some(name)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    profiles: BTreeMap<String, ProfileFilter>,
}

/// The loaded profile registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profiles {
    entries: BTreeMap<String, ProfileFilter>,
}

impl Profiles {
    #[inline]
    pub fn new(entries: BTreeMap<String, ProfileFilter>) -> Self {
        Self { entries }
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&ProfileFilter> {
        self.entries.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered profiles in name order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProfileFilter)> {
        self.entries.iter().map(|(name, filter)| (name.as_str(), filter))
    }

    /// Registered names followed by `all` when it is not registered itself
    #[inline]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        if !self.contains(ALL_PROFILE) {
            names.push(ALL_PROFILE);
        }
        names
    }

    /// Filter for a selection; `None` and `all` match everything
    #[inline]
    pub fn filter_for(&self, selection: Option<&str>) -> Result<MetadataFilter> {
        match selection.and_then(parse_selection) {
            None => Ok(MetadataFilter::match_all()),
            Some(name) => self
                .get(name)
                .map(|profile| build_filter(Some(profile)))
                .ok_or_else(|| RagError::UnknownProfile(name.to_string())),
        }
    }

    /// Human readable filter summary for a selection
    #[inline]
    pub fn describe(&self, selection: Option<&str>) -> String {
        selection
            .and_then(parse_selection)
            .and_then(|name| self.get(name))
            .map_or_else(|| "no filter".to_string(), ProfileFilter::describe)
    }
}

/// Registry file and current-profile pointer on disk.
///
/// The pointer is a single line; an empty or absent file means `all`.
/// Concurrent processes writing the pointer are not coordinated.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    registry_path: PathBuf,
    pointer_path: PathBuf,
}

impl ProfileStore {
    #[inline]
    pub fn new(registry_path: impl Into<PathBuf>, pointer_path: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
            pointer_path: pointer_path.into(),
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.profiles_path(), config.current_profile_path())
    }

    #[inline]
    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    /// Load the registry; a missing file is an empty registry
    #[inline]
    pub fn load(&self) -> Result<Profiles> {
        if !self.registry_path.exists() {
            debug!("No profile registry at {:?}", self.registry_path);
            return Ok(Profiles::default());
        }

        let content = fs::read_to_string(&self.registry_path).with_context(|| {
            format!(
                "Failed to read profile registry {}",
                self.registry_path.display()
            )
        })?;
        let registry: RegistryFile = toml::from_str(&content).map_err(|e| {
            RagError::Config(format!(
                "Invalid profile registry {}: {}",
                self.registry_path.display(),
                e
            ))
        })?;

        debug!("Loaded {} profiles", registry.profiles.len());
        Ok(Profiles::new(registry.profiles))
    }

    /// Persisted current profile, `None` when unset or `all`
    #[inline]
    pub fn current(&self) -> Result<Option<String>> {
        if !self.pointer_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.pointer_path).with_context(|| {
            format!(
                "Failed to read current profile {}",
                self.pointer_path.display()
            )
        })?;
        Ok(parse_selection(&content).map(str::to_string))
    }

    /// Write the pointer; `None` clears it back to `all`
    #[inline]
    pub fn set_current(&self, name: Option<&str>) -> Result<()> {
        if let Some(parent) = self.pointer_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.pointer_path, name.unwrap_or_default())?;
        info!("Current profile set to {}", name.unwrap_or(ALL_PROFILE));
        Ok(())
    }

    /// Validate `name` against the registry and persist it.
    ///
    /// Returns the new selection. Unknown names fail with
    /// [`RagError::UnknownProfile`] and leave the pointer untouched.
    #[inline]
    pub fn select(&self, name: &str) -> Result<Option<String>> {
        let selection = parse_selection(name);
        if let Some(name) = selection {
            let profiles = self.load()?;
            if !profiles.contains(name) {
                return Err(RagError::UnknownProfile(name.to_string()));
            }
        }

        self.set_current(selection)?;
        Ok(selection.map(str::to_string))
    }
}
