//! # lariat: async PostgreSQL record mapper
//!
//! Declarative table metadata, parameterized criterion trees, statement
//! builders with RETURNING, and a relationship-graph loader that fetches
//! declared associations in batches — one key-set query per hop, never one
//! per row.
//!
//! A record type is a plain struct implementing [`Record`]: column fields are
//! ordinary typed values, relationship fields are [`Related`] /
//! [`RelatedMany`] and stay `Unloaded` until a prefetch populates them.
//! Operations run through any [`Executor`] — a connected [`Database`] or a
//! [`Transaction`] begun from one.

pub mod conditions;
pub mod database;
pub mod error;
pub mod executor;
pub mod record;
pub mod row;
pub mod schema;
pub mod statement;
pub mod transaction;
pub mod value;

mod loader;


pub use conditions::{col, parameterize, CompareOp, Criterion, FieldRef, ParameterizedCriterion};
pub use database::{Database, PoolConfig};
pub use error::{OrmError, OrmResult};
pub use executor::Executor;
pub use record::{AnyRecord, Record, Related, RelatedMany, RelatedValue};
pub use row::{FromSqlValue, RawRow};
pub use schema::{
    describe, FieldDescriptor, RelationDescriptor, RelationKind, RelationPath, TableDescriptor,
    TableEntry,
};
pub use statement::{FetchOptions, OrderDirection, Statement};
pub use transaction::Transaction;
pub use value::SqlValue;
