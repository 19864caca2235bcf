//! Declarative table metadata
//!
//! A record type declares its table, fields, and relationships by building a
//! [`TableDescriptor`]; the registry turns that declaration into a validated,
//! immutable [`TableEntry`] exactly once per type.

mod fields;
pub mod registry;
mod relations;

pub use fields::FieldDescriptor;
pub use registry::{describe, TableEntry};
pub use relations::{RelationDescriptor, RelationKind, RelationPath};

use crate::record::Record;

/// A record type's declaration: table name, fields, relationships
///
/// Abstract base descriptors (no table name) exist only to be composed into
/// concrete ones; registering one directly is a schema error.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    pub(crate) table: Option<String>,
    pub(crate) is_abstract: bool,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) relations: Vec<RelationDescriptor>,
}

impl TableDescriptor {
    /// Start a declaration for the named table
    pub fn new(table: &str) -> Self {
        Self {
            table: Some(table.to_string()),
            is_abstract: false,
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Start an abstract base declaration, composed into concrete types
    pub fn abstract_base() -> Self {
        Self {
            table: None,
            is_abstract: true,
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Declare a field
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare a relationship
    pub fn relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    /// Declare a forward foreign-key association
    pub fn belongs_to<T: Record>(self, name: &str, local_field: &str, foreign_column: &str) -> Self {
        self.relation(RelationDescriptor::belongs_to::<T>(
            name,
            local_field,
            foreign_column,
        ))
    }

    /// Declare a reverse one-to-one association
    pub fn has_one<T: Record>(self, name: &str, local_field: &str, foreign_column: &str) -> Self {
        self.relation(RelationDescriptor::has_one::<T>(
            name,
            local_field,
            foreign_column,
        ))
    }

    /// Declare a reverse collection association
    pub fn has_many<T: Record>(self, name: &str, local_field: &str, foreign_column: &str) -> Self {
        self.relation(RelationDescriptor::has_many::<T>(
            name,
            local_field,
            foreign_column,
        ))
    }

    /// Merge an abstract base declaration's fields and relationships
    pub fn compose(mut self, base: TableDescriptor) -> Self {
        self.fields.extend(base.fields);
        self.relations.extend(base.relations);
        self
    }
}
