//! Record metadata registry
//!
//! Entries are built lazily, validated once, and cached process-wide keyed by
//! the record's `TypeId`. After the first build an entry is immutable and
//! shared behind an `Arc`, so lookups are read-mostly and thread-safe.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::error::{OrmError, OrmResult};
use crate::record::{AnyRecord, Record};
use crate::row::RawRow;
use crate::schema::{FieldDescriptor, RelationDescriptor, TableDescriptor};

static REGISTRY: Lazy<DashMap<TypeId, Arc<TableEntry>>> = Lazy::new(DashMap::new);

/// A validated, immutable registry entry for one record type
pub struct TableEntry {
    pub type_name: &'static str,
    pub table: String,
    pub fields: Vec<FieldDescriptor>,
    pub relations: Vec<RelationDescriptor>,
    primary_key: usize,
    by_field: HashMap<String, usize>,
    by_column: HashMap<String, usize>,
    by_qualified: HashMap<String, usize>,
    pub(crate) hydrate: fn(&RawRow) -> OrmResult<Box<dyn AnyRecord>>,
}

impl std::fmt::Debug for TableEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableEntry")
            .field("type_name", &self.type_name)
            .field("table", &self.table)
            .field("fields", &self.fields)
            .field("relations", &self.relations)
            .finish()
    }
}

impl TableEntry {
    /// The primary key field
    pub fn primary_key(&self) -> &FieldDescriptor {
        &self.fields[self.primary_key]
    }

    /// Index of the primary key within the field list
    pub fn primary_key_index(&self) -> usize {
        self.primary_key
    }

    /// Look up a field by struct field name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_field.get(name).map(|&i| &self.fields[i])
    }

    /// Look up a field by bare column name
    pub fn field_by_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.by_column.get(column).map(|&i| &self.fields[i])
    }

    /// Look up a field by `table.column`, as joined results name them
    pub fn field_by_qualified_column(&self, qualified: &str) -> Option<&FieldDescriptor> {
        self.by_qualified.get(qualified).map(|&i| &self.fields[i])
    }

    /// Look up a relationship by field name
    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// The column backing the named field
    pub fn column_of(&self, field: &str) -> OrmResult<&str> {
        self.field(field)
            .map(|f| f.column_name.as_str())
            .ok_or_else(|| OrmError::UnknownField {
                table: self.table.clone(),
                field: field.to_string(),
            })
    }

    /// Column names in declaration order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.column_name.as_str())
    }

    /// Fields whose values are supplied on insert
    pub fn insertable_fields(&self) -> impl Iterator<Item = (usize, &FieldDescriptor)> {
        self.fields.iter().enumerate().filter(|(_, f)| !f.generated)
    }

    pub(crate) fn from_descriptor(
        type_name: &'static str,
        descriptor: TableDescriptor,
        hydrate: fn(&RawRow) -> OrmResult<Box<dyn AnyRecord>>,
    ) -> OrmResult<Self> {
        if descriptor.is_abstract {
            return Err(OrmError::schema(
                type_name,
                "abstract base declarations cannot be registered directly",
            ));
        }

        let table = match descriptor.table {
            Some(table) if !table.is_empty() => table,
            _ => return Err(OrmError::schema(type_name, "no table name declared")),
        };

        let primary_keys: Vec<usize> = descriptor
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.primary_key)
            .map(|(i, _)| i)
            .collect();
        let primary_key = match primary_keys.as_slice() {
            [index] => *index,
            [] => return Err(OrmError::schema(type_name, "declares no primary key field")),
            keys => {
                return Err(OrmError::schema(
                    type_name,
                    format!("declares {} primary key fields, expected exactly one", keys.len()),
                ))
            }
        };

        let mut by_field = HashMap::new();
        let mut by_column = HashMap::new();
        let mut by_qualified = HashMap::new();
        for (i, field) in descriptor.fields.iter().enumerate() {
            if by_field.insert(field.field_name.clone(), i).is_some() {
                return Err(OrmError::schema(
                    type_name,
                    format!("duplicate field `{}`", field.field_name),
                ));
            }
            if by_column.insert(field.column_name.clone(), i).is_some() {
                return Err(OrmError::schema(
                    type_name,
                    format!("duplicate column `{}`", field.column_name),
                ));
            }
            by_qualified.insert(format!("{}.{}", table, field.column_name), i);
        }

        Ok(Self {
            type_name,
            table,
            fields: descriptor.fields,
            relations: descriptor.relations,
            primary_key,
            by_field,
            by_column,
            by_qualified,
            hydrate,
        })
    }
}

fn hydrate_erased<T: Record>(row: &RawRow) -> OrmResult<Box<dyn AnyRecord>> {
    Ok(Box::new(T::from_row(row)?))
}

/// The registry entry for `T`, built and validated on first use
pub fn describe<T: Record>() -> OrmResult<Arc<TableEntry>> {
    if let Some(entry) = REGISTRY.get(&TypeId::of::<T>()) {
        return Ok(entry.clone());
    }
    let entry = Arc::new(TableEntry::from_descriptor(
        std::any::type_name::<T>(),
        T::descriptor(),
        hydrate_erased::<T>,
    )?);
    REGISTRY.insert(TypeId::of::<T>(), entry.clone());
    Ok(entry)
}

/// Alias kept for call sites that read better with `entry::<T>()`
pub(crate) fn entry<T: Record>() -> OrmResult<Arc<TableEntry>> {
    describe::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_hydrate(_row: &RawRow) -> OrmResult<Box<dyn AnyRecord>> {
        Err(OrmError::decode("*", "not hydratable in this test"))
    }

    fn build(descriptor: TableDescriptor) -> OrmResult<TableEntry> {
        TableEntry::from_descriptor("test::Probe", descriptor, no_hydrate)
    }

    #[test]
    fn valid_declaration_builds_lookups() {
        let entry = build(
            TableDescriptor::new("employee")
                .field(FieldDescriptor::new("id").primary_key().generated())
                .field(FieldDescriptor::new("full_name").column("name"))
                .field(FieldDescriptor::new("company_id").nullable()),
        )
        .unwrap();

        assert_eq!(entry.table, "employee");
        assert_eq!(entry.primary_key().field_name, "id");
        assert_eq!(entry.field("full_name").unwrap().column_name, "name");
        assert_eq!(entry.field_by_column("name").unwrap().field_name, "full_name");
        assert_eq!(
            entry
                .field_by_qualified_column("employee.name")
                .unwrap()
                .field_name,
            "full_name"
        );
        assert_eq!(entry.column_of("company_id").unwrap(), "company_id");
        assert!(entry.field("name").is_none());
    }

    #[test]
    fn missing_table_name_is_a_schema_error() {
        let result = build(
            TableDescriptor::abstract_base()
                .field(FieldDescriptor::new("id").primary_key()),
        );
        assert!(matches!(result, Err(OrmError::Schema { .. })));
    }

    #[test]
    fn primary_key_count_must_be_exactly_one() {
        let none = build(TableDescriptor::new("t").field(FieldDescriptor::new("id")));
        assert!(matches!(none, Err(OrmError::Schema { .. })));

        let two = build(
            TableDescriptor::new("t")
                .field(FieldDescriptor::new("a").primary_key())
                .field(FieldDescriptor::new("b").primary_key()),
        );
        assert!(matches!(two, Err(OrmError::Schema { .. })));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let result = build(
            TableDescriptor::new("t")
                .field(FieldDescriptor::new("id").primary_key())
                .field(FieldDescriptor::new("other").column("id")),
        );
        assert!(matches!(result, Err(OrmError::Schema { .. })));
    }

    #[test]
    fn abstract_base_composition_merges_fields() {
        let timestamps = TableDescriptor::abstract_base()
            .field(FieldDescriptor::new("created_at").generated())
            .field(FieldDescriptor::new("updated_at").generated());

        let entry = build(
            TableDescriptor::new("invoice")
                .field(FieldDescriptor::new("id").primary_key().generated())
                .field(FieldDescriptor::new("total"))
                .compose(timestamps),
        )
        .unwrap();

        let columns: Vec<&str> = entry.columns().collect();
        assert_eq!(columns, vec!["id", "total", "created_at", "updated_at"]);
    }

    #[test]
    fn insertable_fields_exclude_generated_columns() {
        let entry = build(
            TableDescriptor::new("employee")
                .field(FieldDescriptor::new("id").primary_key().generated())
                .field(FieldDescriptor::new("name")),
        )
        .unwrap();

        let insertable: Vec<&str> = entry
            .insertable_fields()
            .map(|(_, f)| f.column_name.as_str())
            .collect();
        assert_eq!(insertable, vec!["name"]);
    }
}
