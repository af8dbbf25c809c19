//! Schema description of record types.
//!
//! An [`Entity`] describes itself through an [`EntitySchema`]: how its table
//! may be named, and its members in declaration order. Most types get this
//! from `#[derive(Entity)]`; a hand-written impl works the same way.
//!
//! ```ignore
//! #[derive(Entity)]
//! #[sql(table = "accounts")]
//! struct Account {
//!     #[sql(autoincr)]
//!     id: i64,
//!     email: String,
//!     #[sql(skip)]
//!     cached: Option<String>,
//!     created_at: DateTime<Utc>,
//!     updated_at: DateTime<Utc>,
//! }
//! ```

/// Column names that take the timestamp roles without annotation.
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// A record type that maps to a table.
pub trait Entity: 'static {
    fn schema() -> EntitySchema;
}

/// Which shape of a type a table-name source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// The type itself.
    Value,
    /// A reference to the type.
    Reference,
}

/// A table-name source declared by a record.
#[derive(Debug, Clone, Copy)]
pub enum TableNaming {
    /// Name carried by the record's marker annotation (`#[sql(table = "...")]`).
    Marker(&'static str),
    /// Zero-argument name function (`table_fn` / `table_fn_ref`).
    Method {
        receiver: Shape,
        name: fn() -> String,
    },
}

/// Per-field options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldOptions {
    pub auto_increment: bool,
    pub created: bool,
    pub updated: bool,
}

/// A directly declared, column-bearing field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Rust field name.
    pub field: &'static str,
    /// Annotated column name; the field name is used when absent.
    pub column: Option<&'static str>,
    pub options: FieldOptions,
}

impl FieldDef {
    pub const fn new(field: &'static str) -> Self {
        Self {
            field,
            column: None,
            options: FieldOptions {
                auto_increment: false,
                created: false,
                updated: false,
            },
        }
    }

    pub const fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    pub const fn auto_increment(mut self) -> Self {
        self.options.auto_increment = true;
        self
    }

    pub const fn created(mut self) -> Self {
        self.options.created = true;
        self
    }

    pub const fn updated(mut self) -> Self {
        self.options.updated = true;
        self
    }

    pub fn column_name(&self) -> &'static str {
        self.column.unwrap_or(self.field)
    }
}

/// A record member in declaration order.
#[derive(Debug, Clone)]
pub enum Member {
    Field(FieldDef),
    /// Embedded record whose columns are promoted into the container.
    Embedded {
        field: &'static str,
        schema: fn() -> EntitySchema,
    },
}

/// Everything the mapper needs to know about a record type.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    /// Unqualified type name, used for the snake-case fallback.
    pub type_name: &'static str,
    pub naming: Vec<TableNaming>,
    pub members: Vec<Member>,
}

impl EntitySchema {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            naming: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn table(mut self, name: &'static str) -> Self {
        self.naming.push(TableNaming::Marker(name));
        self
    }

    pub fn table_fn(mut self, receiver: Shape, name: fn() -> String) -> Self {
        self.naming.push(TableNaming::Method { receiver, name });
        self
    }

    pub fn field(mut self, def: FieldDef) -> Self {
        self.members.push(Member::Field(def));
        self
    }

    pub fn embed(mut self, field: &'static str, schema: fn() -> EntitySchema) -> Self {
        self.members.push(Member::Embedded { field, schema });
        self
    }
}
