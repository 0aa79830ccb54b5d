//! Eager definition of attribute accessors.
//!
//! Accessors are derived from a table's columns. At boot the definer only
//! uses metadata that is already at hand, the pool's installed snapshot or
//! the live connection's cache, and silently skips entities for which
//! neither knows the table. It never opens a connection, so an unreachable
//! database cannot keep the application from booting.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::data_access::{ColumnMetadata, ColumnSet, DataAccessError};
use crate::health::HealthReporter;
use crate::pool::ManagedPool;

/// Accessor names that would shadow built-in entity operations.
const RESERVED_ATTRIBUTES: &[&str] = &[
    "attributes",
    "delete",
    "destroy",
    "errors",
    "reload",
    "save",
    "update",
];

/// Accessor definitions generated for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeAccessor {
    /// Attribute (column) name.
    pub attribute: String,
    /// Reader method name.
    pub reader: String,
    /// Writer method name.
    pub writer: String,
    /// Presence predicate name.
    pub predicate: String,
    /// Backend type the attribute is cast from.
    pub sql_type: String,
    /// Whether the attribute may be absent.
    pub nullable: bool,
    /// Value a new record starts with, when the column declares one.
    pub default: Option<String>,
}

impl AttributeAccessor {
    fn for_column(entity: &str, column: &ColumnMetadata) -> Result<Self, DataAccessError> {
        let name = column.name.as_str();
        if name.is_empty() || RESERVED_ATTRIBUTES.contains(&name) {
            return Err(DataAccessError::DangerousAttribute {
                entity: entity.to_owned(),
                attribute: name.to_owned(),
            });
        }
        Ok(Self {
            attribute: name.to_owned(),
            reader: name.to_owned(),
            writer: format!("set_{name}"),
            predicate: format!("{name}_present"),
            sql_type: column.sql_type.clone(),
            nullable: column.nullable,
            default: column.default.clone(),
        })
    }
}

/// One modelled record type.
#[derive(Debug)]
pub struct EntityDescriptor {
    name: String,
    table_name: String,
    pool: Arc<ManagedPool>,
    accessors: OnceLock<Vec<AttributeAccessor>>,
}

impl EntityDescriptor {
    /// Describes entity `name`, stored in `table_name` behind `pool`.
    #[must_use]
    pub fn new(name: impl Into<String>, table_name: impl Into<String>, pool: Arc<ManagedPool>) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            pool,
            accessors: OnceLock::new(),
        }
    }

    /// Entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Backing table.
    #[must_use]
    pub fn table_name(&self) -> &str {
        self.table_name.as_str()
    }

    /// Pool the entity's table lives behind.
    #[must_use]
    pub fn pool(&self) -> &ManagedPool {
        &self.pool
    }

    /// Returns `true` when the entity's pool holds a live connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.pool.is_connected()
    }

    /// Accessors defined so far, if any.
    #[must_use]
    pub fn accessors(&self) -> Option<&[AttributeAccessor]> {
        self.accessors.get().map(Vec::as_slice)
    }

    /// Generates accessors from `columns`.
    ///
    /// Returns `Ok(false)` when accessors were already defined.
    pub fn define_accessors(&self, columns: &ColumnSet) -> Result<bool, DataAccessError> {
        if self.accessors.get().is_some() {
            return Ok(false);
        }
        let accessors = columns
            .iter()
            .map(|column| AttributeAccessor::for_column(&self.name, column))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.accessors.set(accessors).is_ok())
    }
}

/// Where the columns used for an entity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSource {
    /// The pool's installed schema snapshot.
    Snapshot,
    /// The live connection's cached metadata.
    Connection,
}

impl fmt::Display for MetadataSource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Snapshot => "snapshot",
            Self::Connection => "connection",
        })
    }
}

/// Summary of one definition pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionReport {
    defined: Vec<(String, MetadataSource)>,
    skipped: Vec<String>,
    aborted: Option<String>,
}

impl DefinitionReport {
    /// Entities whose accessors were defined, with their metadata source.
    #[must_use]
    pub fn defined(&self) -> &[(String, MetadataSource)] {
        &self.defined
    }

    /// Entities skipped because no metadata was cached.
    #[must_use]
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Returns `true` when the pass stopped on an error.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Description of the error that stopped the pass.
    #[must_use]
    pub fn aborted(&self) -> Option<&str> {
        self.aborted.as_deref()
    }
}

/// Defines accessors for every entity whose columns are already known.
///
/// The first data-access error ends the pass; it is reported once and boot
/// carries on.
pub fn define_attribute_methods(
    entities: &[Arc<EntityDescriptor>],
    reporter: &dyn HealthReporter,
) -> DefinitionReport {
    let mut report = DefinitionReport::default();
    for entity in entities {
        if let Err(error) = define_entity(entity, &mut report) {
            reporter.attribute_definition_failed(entity.name(), &error);
            report.aborted = Some(format!("{}: {error}", error.kind()));
            break;
        }
    }
    reporter.attributes_defined(&report);
    report
}

fn define_entity(
    entity: &EntityDescriptor,
    report: &mut DefinitionReport,
) -> Result<(), DataAccessError> {
    match cached_columns(entity)? {
        Some((columns, source)) => {
            entity.define_accessors(&columns)?;
            report.defined.push((entity.name().to_owned(), source));
        }
        None => report.skipped.push(entity.name().to_owned()),
    }
    Ok(())
}

fn cached_columns(
    entity: &EntityDescriptor,
) -> Result<Option<(ColumnSet, MetadataSource)>, DataAccessError> {
    if let Some(columns) = entity
        .pool()
        .schema_cache()
        .and_then(|snapshot| snapshot.columns(entity.table_name()).cloned())
    {
        return Ok(Some((columns, MetadataSource::Snapshot)));
    }
    if !entity.is_connected() {
        return Ok(None);
    }
    let columns = entity
        .pool()
        .connection()
        .cached_columns(entity.table_name())?;
    Ok(columns.map(|columns| (columns, MetadataSource::Connection)))
}
