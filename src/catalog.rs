use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Background theme, resolved to parallax layers when the level starts.
    #[serde(default)]
    pub theme: String,
}

impl LevelDef {
    pub fn new(id: &str, name: &str, theme: &str) -> Self {
        LevelDef {
            id: id.to_string(),
            name: name.to_string(),
            theme: theme.to_string(),
        }
    }
}

pub fn builtin_levels() -> Vec<LevelDef> {
    vec![
        LevelDef::new("forest-1", "Whispering Woods", "forest"),
        LevelDef::new("caves-1", "Echo Caverns", "caves"),
        LevelDef::new("peaks-1", "Frostbite Peaks", "mountains"),
    ]
}

/// Ordered, read-only list of levels for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    levels: Vec<LevelDef>,
}

impl Catalog {
    pub fn new(levels: Vec<LevelDef>) -> Self {
        Catalog { levels }
    }

    /// Every level needs a non-blank id and name, and ids must be unique.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.levels.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for (position, level) in self.levels.iter().enumerate() {
            if level.id.trim().is_empty() {
                return Err(CatalogError::MissingId(position));
            }
            if level.name.trim().is_empty() {
                return Err(CatalogError::MissingName(level.id.clone()));
            }
            if !seen.insert(level.id.as_str()) {
                return Err(CatalogError::DuplicateId(level.id.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&LevelDef> {
        self.levels.get(index)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> &[LevelDef] {
        &self.levels
    }
}
