//! Entity mapper.
//!
//! Resolves a record type to its table name and its ordered column list.
//! Results are cached per type for the life of the [`Mapper`].

use std::any::{TypeId, type_name};
use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use heck::ToSnakeCase;
use once_cell::sync::Lazy;

use crate::entity::{CREATED_AT, Entity, EntitySchema, Member, Shape, TableNaming, UPDATED_AT};
use crate::error::{MintError, MintResult};

const MAX_EMBED_DEPTH: usize = 16;

static GLOBAL: Lazy<Mapper> = Lazy::new(Mapper::new);

/// A resolved column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: &'static str,
    pub auto_increment: bool,
    pub created: bool,
    pub updated: bool,
    /// Field access path from the mapped record, outermost first.
    pub source_path: Vec<&'static str>,
}

impl ColumnDescriptor {
    /// Timestamp columns are never bound from arguments in UPDATE.
    pub fn is_timestamp(&self) -> bool {
        self.created || self.updated
    }
}

/// Cached mapping of a record type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub type_name: &'static str,
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
    primary_key: Option<usize>,
}

impl EntityDescriptor {
    /// The auto-increment column, if any.
    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.primary_key.map(|i| &self.columns[i])
    }

    /// The column holding the update timestamp role.
    pub fn updated_column(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.updated)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }
}

/// Table-name registry plus descriptor cache.
#[derive(Default)]
pub struct Mapper {
    tables: DashMap<(TypeId, Shape), String>,
    descriptors: DashMap<TypeId, Arc<EntityDescriptor>>,
}

impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide mapper used by the free functions of this crate.
    pub fn global() -> &'static Mapper {
        &GLOBAL
    }

    /// Register an explicit table name for `T` in the given shape.
    ///
    /// Value and reference registrations are stored independently; any
    /// cached descriptor of `T` is dropped.
    pub fn register_table_name<T: ?Sized + 'static>(&self, shape: Shape, name: impl Into<String>) {
        let id = TypeId::of::<T>();
        self.tables.insert((id, shape), name.into());
        self.descriptors.remove(&id);
    }

    fn registered_table_name(&self, id: TypeId) -> Option<String> {
        [Shape::Value, Shape::Reference]
            .iter()
            .find_map(|shape| self.tables.get(&(id, *shape)).map(|name| name.value().clone()))
    }

    /// Resolve the table name of `E`.
    pub fn read_table_name<E: Entity>(&self) -> MintResult<String> {
        if let Some(descriptor) = self.descriptors.get(&TypeId::of::<E>()) {
            return Ok(descriptor.table_name.clone());
        }
        resolve_table_name(self.registered_table_name(TypeId::of::<E>()), &E::schema())
    }

    /// Resolve the ordered column list of `E`.
    pub fn resolve_columns<E: Entity>(&self) -> MintResult<Vec<ColumnDescriptor>> {
        Ok(self.descriptor::<E>()?.columns.clone())
    }

    /// The cached descriptor of `E`, built on first use.
    pub fn descriptor<E: Entity>(&self) -> MintResult<Arc<EntityDescriptor>> {
        let id = TypeId::of::<E>();
        if let Some(descriptor) = self.descriptors.get(&id) {
            tracing::trace!("descriptor cache hit for {}", type_name::<E>());
            return Ok(Arc::clone(&descriptor));
        }

        let schema = E::schema();
        let registered = self.registered_table_name(id);
        let table_name = resolve_table_name(registered.clone(), &schema)?;
        let columns = resolve_columns(&schema)?;

        let mut auto = columns.iter().enumerate().filter(|(_, c)| c.auto_increment);
        let primary_key = auto.next().map(|(i, _)| i);
        if let Some((_, extra)) = auto.next() {
            return Err(MintError::mapping(
                schema.type_name,
                format!("more than one auto-increment column (second is '{}')", extra.name),
            ));
        }

        let descriptor = Arc::new(EntityDescriptor {
            type_name: schema.type_name,
            table_name,
            columns,
            primary_key,
        });
        tracing::debug!(
            "mapped {} to table '{}' with {} columns",
            schema.type_name,
            descriptor.table_name,
            descriptor.columns.len()
        );

        self.descriptors.insert(id, Arc::clone(&descriptor));

        // A registration racing with the build has already evicted; drop ours too.
        if self.registered_table_name(id) != registered {
            self.descriptors.remove_if(&id, |_, cached| Arc::ptr_eq(cached, &descriptor));
            return self.descriptor::<E>();
        }
        Ok(descriptor)
    }
}

/// Register an explicit table name for `T` in the process-wide mapper.
pub fn register_table_name<T: ?Sized + 'static>(shape: Shape, name: impl Into<String>) {
    Mapper::global().register_table_name::<T>(shape, name)
}

/// Resolve the table name of `E` with the process-wide mapper.
pub fn read_table_name<E: Entity>() -> MintResult<String> {
    Mapper::global().read_table_name::<E>()
}

/// Table name precedence: registration, marker, value method, reference
/// method, snake-cased type name. First match wins.
fn resolve_table_name(registered: Option<String>, schema: &EntitySchema) -> MintResult<String> {
    if let Some(name) = registered {
        return Ok(name);
    }

    let mut naming = Vec::new();
    collect_naming(schema, &mut naming, 0)?;

    let marker = naming.iter().find_map(|n| match n {
        TableNaming::Marker(name) => Some(name.to_string()),
        _ => None,
    });
    if let Some(name) = marker {
        return Ok(name);
    }

    for receiver in [Shape::Value, Shape::Reference] {
        let method = naming.iter().find_map(|n| match n {
            TableNaming::Method { receiver: r, name } if *r == receiver => Some(name),
            _ => None,
        });
        if let Some(name) = method {
            return Ok(name());
        }
    }

    let fallback = schema.type_name.to_snake_case();
    if fallback.is_empty() {
        return Err(MintError::mapping(schema.type_name, "no discoverable table name"));
    }
    Ok(fallback)
}

/// Own naming sources first, then those promoted from embedded records.
fn collect_naming(schema: &EntitySchema, out: &mut Vec<TableNaming>, depth: usize) -> MintResult<()> {
    if depth > MAX_EMBED_DEPTH {
        return Err(MintError::mapping(schema.type_name, "embedding nested too deeply"));
    }
    out.extend(schema.naming.iter().copied());
    for member in &schema.members {
        if let Member::Embedded { schema: inner, .. } = member {
            collect_naming(&inner(), out, depth + 1)?;
        }
    }
    Ok(())
}

fn resolve_columns(schema: &EntitySchema) -> MintResult<Vec<ColumnDescriptor>> {
    let mut columns = Vec::new();
    let mut seen = HashSet::new();
    walk_members(schema, &[], &mut columns, &mut seen, 0)?;
    Ok(columns)
}

/// Own fields are emitted before any promoted field, whatever the
/// declaration position of the embedded member.
fn walk_members(
    schema: &EntitySchema,
    prefix: &[&'static str],
    out: &mut Vec<ColumnDescriptor>,
    seen: &mut HashSet<&'static str>,
    depth: usize,
) -> MintResult<()> {
    if depth > MAX_EMBED_DEPTH {
        return Err(MintError::mapping(schema.type_name, "embedding nested too deeply"));
    }

    let mut embedded = Vec::new();
    for member in &schema.members {
        match member {
            Member::Field(def) => {
                let name = def.column_name();
                if name.is_empty() {
                    return Err(MintError::mapping(
                        schema.type_name,
                        format!("field '{}' has an empty column name", def.field),
                    ));
                }
                if !seen.insert(name) {
                    continue;
                }
                let mut source_path = prefix.to_vec();
                source_path.push(def.field);
                out.push(ColumnDescriptor {
                    name,
                    auto_increment: def.options.auto_increment,
                    created: def.options.created || name == CREATED_AT,
                    updated: def.options.updated || name == UPDATED_AT,
                    source_path,
                });
            }
            Member::Embedded { field, schema: inner } => embedded.push((*field, *inner)),
        }
    }

    for (field, inner) in embedded {
        let mut path = prefix.to_vec();
        path.push(field);
        walk_members(&inner(), &path, out, seen, depth + 1)?;
    }
    Ok(())
}
