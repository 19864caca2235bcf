//! Record trait and relationship field containers
//!
//! A record type is a plain struct whose column fields are ordinary typed
//! values and whose relationship fields are [`Related`] / [`RelatedMany`].
//! Both start out `Unloaded`; reading them in that state is a loud error,
//! distinct from "fetched and absent/empty". The loader moves instances
//! around type-erased, so `Record` has an object-safe shadow, [`AnyRecord`].

use std::any::Any;
use std::fmt;

use crate::error::{OrmError, OrmResult};
use crate::row::RawRow;
use crate::schema::TableDescriptor;
use crate::value::SqlValue;

/// A declared record type mapping to one table
///
/// Implemented by hand today; a derive macro can take over the mechanical
/// parts in the future.
pub trait Record: Clone + fmt::Debug + Send + Sync + 'static {
    /// The type's declarative table metadata, read once by the registry
    fn descriptor() -> TableDescriptor;

    /// Build an instance from a result row
    ///
    /// Columns that do not correspond to a declared field are ignored;
    /// relationship fields start `Unloaded`.
    fn from_row(row: &RawRow) -> OrmResult<Self>;

    /// Current field values, one per declared field, in declaration order
    fn values(&self) -> OrmResult<Vec<SqlValue>>;

    /// The current value of one named field
    fn value_of(&self, field: &str) -> OrmResult<SqlValue>;

    /// Replace a relationship field with a freshly loaded value
    fn set_related(&mut self, field: &str, value: RelatedValue) -> OrmResult<()>;

    /// Clone a relationship field's loaded value out of the instance
    ///
    /// Fails with `UnloadedRelationship` when the field has not been loaded.
    fn related(&self, field: &str) -> OrmResult<RelatedValue>;
}

/// Object-safe view of a record, used by the relationship loader
pub trait AnyRecord: Any + fmt::Debug + Send + Sync {
    fn value_of(&self, field: &str) -> OrmResult<SqlValue>;
    fn set_related(&mut self, field: &str, value: RelatedValue) -> OrmResult<()>;
    fn related(&self, field: &str) -> OrmResult<RelatedValue>;
    fn clone_box(&self) -> Box<dyn AnyRecord>;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Record> AnyRecord for T {
    fn value_of(&self, field: &str) -> OrmResult<SqlValue> {
        Record::value_of(self, field)
    }

    fn set_related(&mut self, field: &str, value: RelatedValue) -> OrmResult<()> {
        Record::set_related(self, field, value)
    }

    fn related(&self, field: &str) -> OrmResult<RelatedValue> {
        Record::related(self, field)
    }

    fn clone_box(&self) -> Box<dyn AnyRecord> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A relationship value in transit between the loader and a record instance
#[derive(Debug)]
pub enum RelatedValue {
    /// A to-one value; `None` means fetched and absent
    One(Option<Box<dyn AnyRecord>>),
    /// A to-many collection; empty means fetched and empty
    Many(Vec<Box<dyn AnyRecord>>),
}

fn short_type_name<T>() -> String {
    std::any::type_name::<T>()
        .rsplit("::")
        .next()
        .unwrap_or("record")
        .to_string()
}

pub(crate) fn downcast_record<T: Record>(boxed: Box<dyn AnyRecord>) -> OrmResult<Box<T>> {
    boxed.into_any().downcast::<T>().map_err(|_| {
        OrmError::schema(
            std::any::type_name::<T>(),
            "relationship target does not match the declared field type",
        )
    })
}

/// A to-one relationship field
///
/// `Unloaded` until the loader (or the caller) populates it; a loaded field
/// holds `None` when the key was NULL or matched nothing.
#[derive(Debug, Clone, Default)]
pub enum Related<T> {
    #[default]
    Unloaded,
    Loaded(Option<Box<T>>),
}

impl<T> Related<T> {
    /// A field populated at construction time
    pub fn loaded(value: Option<T>) -> Self {
        Related::Loaded(value.map(Box::new))
    }

    /// True once the relationship has been fetched
    pub fn is_loaded(&self) -> bool {
        matches!(self, Related::Loaded(_))
    }

    /// The loaded value; `UnloadedRelationship` if never fetched
    pub fn get(&self) -> OrmResult<Option<&T>> {
        match self {
            Related::Unloaded => Err(OrmError::UnloadedRelationship {
                field: short_type_name::<T>(),
            }),
            Related::Loaded(value) => Ok(value.as_deref()),
        }
    }

    /// Replace the field with an explicitly loaded value
    pub fn set(&mut self, value: Option<T>) {
        *self = Related::Loaded(value.map(Box::new));
    }
}

impl<T: Record> Related<T> {
    /// Build the field from a loader-provided dynamic value
    pub fn from_dynamic(value: RelatedValue) -> OrmResult<Self> {
        match value {
            RelatedValue::One(None) => Ok(Related::Loaded(None)),
            RelatedValue::One(Some(boxed)) => {
                Ok(Related::Loaded(Some(downcast_record::<T>(boxed)?)))
            }
            RelatedValue::Many(_) => Err(OrmError::schema(
                std::any::type_name::<T>(),
                "a to-one field cannot hold a collection",
            )),
        }
    }

    /// Clone the loaded value into the loader's dynamic representation
    pub fn to_dynamic(&self) -> OrmResult<RelatedValue> {
        match self.get()? {
            None => Ok(RelatedValue::One(None)),
            Some(value) => Ok(RelatedValue::One(Some(Box::new(value.clone())))),
        }
    }
}

/// A to-many relationship field
#[derive(Debug, Clone, Default)]
pub enum RelatedMany<T> {
    #[default]
    Unloaded,
    Loaded(Vec<T>),
}

impl<T> RelatedMany<T> {
    /// A collection populated at construction time
    pub fn loaded(values: Vec<T>) -> Self {
        RelatedMany::Loaded(values)
    }

    /// True once the relationship has been fetched
    pub fn is_loaded(&self) -> bool {
        matches!(self, RelatedMany::Loaded(_))
    }

    /// The loaded collection; `UnloadedRelationship` if never fetched
    pub fn get(&self) -> OrmResult<&[T]> {
        match self {
            RelatedMany::Unloaded => Err(OrmError::UnloadedRelationship {
                field: short_type_name::<T>(),
            }),
            RelatedMany::Loaded(values) => Ok(values),
        }
    }

    /// Replace the field with an explicitly loaded collection
    pub fn set(&mut self, values: Vec<T>) {
        *self = RelatedMany::Loaded(values);
    }
}

impl<T: Record> RelatedMany<T> {
    /// Build the field from a loader-provided dynamic value
    pub fn from_dynamic(value: RelatedValue) -> OrmResult<Self> {
        match value {
            RelatedValue::Many(boxed) => {
                let mut values = Vec::with_capacity(boxed.len());
                for item in boxed {
                    values.push(*downcast_record::<T>(item)?);
                }
                Ok(RelatedMany::Loaded(values))
            }
            RelatedValue::One(_) => Err(OrmError::schema(
                std::any::type_name::<T>(),
                "a to-many field cannot hold a single value",
            )),
        }
    }

    /// Clone the loaded collection into the loader's dynamic representation
    pub fn to_dynamic(&self) -> OrmResult<RelatedValue> {
        let values = self.get()?;
        Ok(RelatedValue::Many(
            values
                .iter()
                .map(|value| Box::new(value.clone()) as Box<dyn AnyRecord>)
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unloaded_access_fails_loudly() {
        let field: Related<String> = Related::default();
        assert!(matches!(
            field.get(),
            Err(OrmError::UnloadedRelationship { .. })
        ));

        let many: RelatedMany<String> = RelatedMany::default();
        assert!(matches!(
            many.get(),
            Err(OrmError::UnloadedRelationship { .. })
        ));
    }

    #[test]
    fn loaded_none_is_distinct_from_unloaded() {
        let field: Related<String> = Related::loaded(None);
        assert!(field.is_loaded());
        assert_eq!(field.get().unwrap(), None);

        let many: RelatedMany<String> = RelatedMany::loaded(Vec::new());
        assert!(many.is_loaded());
        assert!(many.get().unwrap().is_empty());
    }

    #[test]
    fn set_replaces_the_sentinel() {
        let mut field = Related::default();
        field.set(Some("acme".to_string()));
        assert_eq!(field.get().unwrap(), Some(&"acme".to_string()));

        let mut many = RelatedMany::default();
        many.set(vec![1, 2, 3]);
        assert_eq!(many.get().unwrap(), &[1, 2, 3]);
    }
}
