//! Field descriptors

/// Declarative metadata for one column-backed field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Name of the struct field
    pub field_name: String,
    /// Column name; defaults to the field name
    pub column_name: String,
    /// Exactly one field per concrete record type carries this flag
    pub primary_key: bool,
    /// Value supplied by the database, never sent on insert
    pub generated: bool,
    /// The column admits NULL
    pub nullable: bool,
}

impl FieldDescriptor {
    /// Declare a field whose column name matches the field name
    pub fn new(name: &str) -> Self {
        Self {
            field_name: name.to_string(),
            column_name: name.to_string(),
            primary_key: false,
            generated: false,
            nullable: false,
        }
    }

    /// Override the column name
    pub fn column(mut self, column: &str) -> Self {
        self.column_name = column.to_string();
        self
    }

    /// Mark this field as the primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark the value as database-generated (excluded from inserts)
    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    /// Mark the column as nullable
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}
