//! Error types for the mapping layer
//!
//! One taxonomy covers declaration, connection lifecycle, execution, and
//! hydration failures. Nothing in this crate downgrades or retries an error;
//! whatever the driver reports is surfaced with the statement that caused it.

/// Result type alias for all mapper operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error type for all mapper operations
#[derive(Debug, thiserror::Error)]
pub enum OrmError {
    /// A record declaration is invalid (missing table name, wrong primary key count)
    #[error("schema error for `{type_name}`: {message}")]
    Schema {
        type_name: &'static str,
        message: String,
    },

    /// A prefetch path references a relationship that is not declared
    #[error("invalid relationship `{path}` on `{table}`")]
    InvalidRelationship { table: String, path: String },

    /// No connection or pool has been established
    #[error("not connected to a database")]
    NotConnected,

    /// A connection or pool is already established
    #[error("a connection or pool is already established")]
    AlreadyConnected,

    /// Establishing or closing the connection failed
    #[error("connection error: {0}")]
    Connection(String),

    /// An exactly-one fetch matched no rows
    #[error("expected exactly one `{table}` row, found none")]
    NoResultsReturned { table: String },

    /// An exactly-one fetch matched more than one row
    #[error("expected exactly one `{table}` row, found more than one")]
    MultipleResultsReturned { table: String },

    /// A write keyed on the primary key was given an instance without one
    #[error("`{table}` instance has no primary key value")]
    MissingPrimaryKey { table: String },

    /// A relationship field was read before being fetched
    #[error("relationship `{field}` has not been loaded from the database")]
    UnloadedRelationship { field: String },

    /// A field name does not exist on the record type
    #[error("unknown field `{field}` on `{table}`")]
    UnknownField { table: String, field: String },

    /// A row value could not be coerced into its declared field type
    #[error("cannot decode column `{column}`: {message}")]
    Decode { column: String, message: String },

    /// The execution boundary reported a failure
    #[error("database error while executing `{statement}`: {source}")]
    Database {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    /// A transaction was used after commit or rollback
    #[error("transaction error: {0}")]
    Transaction(String),
}

impl OrmError {
    pub(crate) fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        OrmError::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    pub(crate) fn schema(type_name: &'static str, message: impl Into<String>) -> Self {
        OrmError::Schema {
            type_name,
            message: message.into(),
        }
    }
}
