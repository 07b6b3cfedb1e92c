// Tags. `name_lc` is the unique lookup/search/cursor key; `name` keeps the
// display casing from whoever created the tag first.

use serde::Serialize;

use crate::core::TagId;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub name_lc: String,
}

impl Tag {
    /// Normalize a display name into a tag. Creation is idempotent by
    /// `name_lc` at the store level.
    pub fn create(name: &str) -> AppResult<Self> {
        let name = validated_name(name)?;
        let name_lc = name.to_lowercase();
        Ok(Tag {
            id: 0,
            name,
            name_lc,
        })
    }

    pub fn rename(&mut self, new_name: &str) -> AppResult<()> {
        let name = validated_name(new_name)?;
        self.name_lc = name.to_lowercase();
        self.name = name;
        Ok(())
    }
}

fn validated_name(name: &str) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidParam("tag name is blank".to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_name() {
        let tag = Tag::create("  Running ").unwrap();
        assert_eq!(tag.name, "Running");
        assert_eq!(tag.name_lc, "running");
    }

    #[test]
    fn blank_name_rejected() {
        assert!(Tag::create(" \t ").is_err());
    }
}
