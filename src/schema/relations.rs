//! Relationship descriptors and traversal paths

use std::sync::Arc;

use crate::conditions::Criterion;
use crate::error::OrmResult;
use crate::record::Record;
use crate::schema::registry::{self, TableEntry};

/// The declared association kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Forward foreign key: this type holds the key of a single target row
    BelongsTo,
    /// Reverse unique: a single target row holds this type's key
    HasOne,
    /// Reverse collection: many target rows hold this type's key
    HasMany,
}

impl RelationKind {
    /// Returns true if this kind resolves to a collection
    pub fn is_collection(self) -> bool {
        matches!(self, RelationKind::HasMany)
    }
}

/// Declarative metadata for one association
///
/// The target entry is resolved lazily through the registry, so targets may
/// be declared later in the program or be the owning type itself.
#[derive(Clone)]
pub struct RelationDescriptor {
    /// Name of the relationship field on the owning struct
    pub name: String,
    pub kind: RelationKind,
    /// Field on the owning type whose value is the hop key
    pub local_field: String,
    /// Column on the target table matched against the hop key
    pub foreign_column: String,
    /// Extra filter conjoined into every hop query for this relationship
    pub filter: Option<Criterion>,
    target: fn() -> OrmResult<Arc<TableEntry>>,
}

impl RelationDescriptor {
    /// Declare a forward foreign-key association
    pub fn belongs_to<T: Record>(name: &str, local_field: &str, foreign_column: &str) -> Self {
        Self::declare::<T>(RelationKind::BelongsTo, name, local_field, foreign_column)
    }

    /// Declare a reverse one-to-one association
    pub fn has_one<T: Record>(name: &str, local_field: &str, foreign_column: &str) -> Self {
        Self::declare::<T>(RelationKind::HasOne, name, local_field, foreign_column)
    }

    /// Declare a reverse collection association
    pub fn has_many<T: Record>(name: &str, local_field: &str, foreign_column: &str) -> Self {
        Self::declare::<T>(RelationKind::HasMany, name, local_field, foreign_column)
    }

    /// Conjoin a permanent filter into every query for this relationship
    pub fn filter(mut self, criterion: Criterion) -> Self {
        self.filter = Some(criterion);
        self
    }

    /// The registry entry of the association's target type
    pub fn target_entry(&self) -> OrmResult<Arc<TableEntry>> {
        (self.target)()
    }

    fn declare<T: Record>(
        kind: RelationKind,
        name: &str,
        local_field: &str,
        foreign_column: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            local_field: local_field.to_string(),
            foreign_column: foreign_column.to_string(),
            filter: None,
            target: registry::entry::<T>,
        }
    }
}

impl std::fmt::Debug for RelationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("local_field", &self.local_field)
            .field("foreign_column", &self.foreign_column)
            .field("filter", &self.filter)
            .finish()
    }
}

/// A dot-separated traversal path over declared relationship names
///
/// `"employees.company"` walks the owning type's `employees` relationship,
/// then the `company` relationship of each fetched employee. Every segment
/// is validated against the registry before any query runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPath {
    pub segments: Vec<String>,
}

impl RelationPath {
    /// Split a dot-separated path into its hop names
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_split_on_dots() {
        let path = RelationPath::parse("employees.company");
        assert_eq!(path.segments, vec!["employees", "company"]);

        let single = RelationPath::parse("employees");
        assert_eq!(single.segments, vec!["employees"]);
    }

    #[test]
    fn only_has_many_is_a_collection() {
        assert!(RelationKind::HasMany.is_collection());
        assert!(!RelationKind::HasOne.is_collection());
        assert!(!RelationKind::BelongsTo.is_collection());
    }
}
