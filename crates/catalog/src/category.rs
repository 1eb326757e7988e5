use serde::{Deserialize, Serialize};

use cakestore_core::{CategoryId, DomainError, DomainResult, Entity};

/// A named grouping of cakes. Many cakes may reference one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
}

impl Category {
    /// Overwrite name and description from `details`.
    pub fn apply(&mut self, details: NewCategory) {
        self.name = details.name;
        self.description = details.description;
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Category fields as supplied by a client (create or overwrite).
///
/// Duplicate names are permitted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl NewCategory {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("category name must not be empty"));
        }
        Ok(())
    }

    pub fn into_category(self, id: CategoryId) -> Category {
        Category {
            id,
            name: self.name,
            description: self.description,
        }
    }
}
