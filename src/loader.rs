//! Relationship graph loader
//!
//! Given a batch of hydrated instances and a set of traversal paths, loads
//! every hop with a single batched key-set query, attaches the results onto
//! the correct field of each source instance, and recurses into the rest of
//! the path against the freshly fetched batch.
//!
//! Invariants upheld here:
//! - every path segment is validated against the registry before any query
//! - an empty source batch (or an all-NULL key set) issues no query
//! - one query per hop, regardless of batch size
//! - after a hop is attached, no source instance is left `Unloaded` for that
//!   field: a missing match becomes an explicit `None` or an empty collection
//! - a hop whose (source table, source column, target table, target column)
//!   identity was already satisfied earlier in the same call reuses the
//!   loaded values instead of querying again

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::conditions::col;
use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::record::{AnyRecord, RelatedValue};
use crate::schema::registry::TableEntry;
use crate::schema::{RelationDescriptor, RelationKind, RelationPath};
use crate::statement::{self, FetchOptions};
use crate::value::SqlValue;

/// Load every path onto the batch, chain by chain in caller order
pub(crate) async fn load_related(
    executor: &dyn Executor,
    entry: &Arc<TableEntry>,
    items: &mut [Box<dyn AnyRecord>],
    paths: &[RelationPath],
) -> OrmResult<()> {
    for path in paths {
        validate_path(entry, path)?;
    }

    let mut satisfied = HashSet::new();
    for path in paths {
        load_chain(executor, entry.clone(), items, &path.segments, &mut satisfied).await?;
    }
    Ok(())
}

/// Walk a path through the declared graph without touching the database
fn validate_path(entry: &Arc<TableEntry>, path: &RelationPath) -> OrmResult<()> {
    if path.segments.is_empty() {
        return Err(OrmError::InvalidRelationship {
            table: entry.table.clone(),
            path: String::new(),
        });
    }

    let mut current = entry.clone();
    for segment in &path.segments {
        let relation = current
            .relation(segment)
            .ok_or_else(|| OrmError::InvalidRelationship {
                table: current.table.clone(),
                path: segment.clone(),
            })?;
        current = relation.target_entry()?;
    }
    Ok(())
}

fn load_chain<'a>(
    executor: &'a dyn Executor,
    entry: Arc<TableEntry>,
    items: &'a mut [Box<dyn AnyRecord>],
    segments: &'a [String],
    satisfied: &'a mut HashSet<String>,
) -> Pin<Box<dyn Future<Output = OrmResult<()>> + Send + 'a>> {
    Box::pin(async move {
        let (segment, rest) = match segments.split_first() {
            Some(parts) => parts,
            None => return Ok(()),
        };
        if items.is_empty() {
            return Ok(());
        }

        let relation = entry
            .relation(segment)
            .ok_or_else(|| OrmError::InvalidRelationship {
                table: entry.table.clone(),
                path: segment.clone(),
            })?;
        let target = relation.target_entry()?;
        let local_column = entry.column_of(&relation.local_field)?;
        let identity = format!(
            "{}.{}:{}.{}",
            entry.table, local_column, target.table, relation.foreign_column
        );

        // Children are fully loaded (recursion first) before they are
        // attached, so parents never hold partially populated values.
        let mut children = if satisfied.contains(&identity) {
            match collect_loaded(items, relation) {
                Ok(children) => {
                    tracing::debug!(hop = %identity, "reusing already loaded relationship hop");
                    children
                }
                // A distinct relation sharing the column pair: its field is
                // still unloaded, so fall back to querying.
                Err(_) => query_hop(executor, &entry, relation, &target, items).await?,
            }
        } else {
            let children = query_hop(executor, &entry, relation, &target, items).await?;
            satisfied.insert(identity);
            children
        };

        if !rest.is_empty() {
            load_chain(executor, target.clone(), &mut children, rest, satisfied).await?;
        }

        attach(items, relation, &target, children)
    })
}

/// Fetch every hop target for the batch with one membership query
async fn query_hop(
    executor: &dyn Executor,
    entry: &TableEntry,
    relation: &RelationDescriptor,
    target: &TableEntry,
    items: &[Box<dyn AnyRecord>],
) -> OrmResult<Vec<Box<dyn AnyRecord>>> {
    let mut keys = Vec::new();
    let mut seen = HashSet::new();
    for item in items {
        let key = item.value_of(&relation.local_field)?;
        if !key.is_null() && seen.insert(key.clone()) {
            keys.push(key);
        }
    }

    if keys.is_empty() {
        tracing::debug!(
            source = %entry.table,
            target = %target.table,
            "skipping relationship hop: no usable keys in batch"
        );
        return Ok(Vec::new());
    }

    let mut criterion = col(&relation.foreign_column).is_in(keys);
    if let Some(filter) = &relation.filter {
        criterion = criterion.and(filter.clone());
    }

    tracing::debug!(
        source = %entry.table,
        target = %target.table,
        relation = %relation.name,
        batch = items.len(),
        "loading relationship hop"
    );
    let options = FetchOptions::new().distinct();
    let rows = executor
        .fetch_rows(statement::select(target, Some(&criterion), &options))
        .await?;
    rows.iter().map(|row| (target.hydrate)(row)).collect()
}

/// Re-extract the hop's children from the already loaded source fields
fn collect_loaded(
    items: &[Box<dyn AnyRecord>],
    relation: &RelationDescriptor,
) -> OrmResult<Vec<Box<dyn AnyRecord>>> {
    let mut children = Vec::new();
    for item in items {
        match item.related(&relation.name)? {
            RelatedValue::One(Some(child)) => children.push(child),
            RelatedValue::One(None) => {}
            RelatedValue::Many(mut list) => children.append(&mut list),
        }
    }
    Ok(children)
}

/// Assemble the hop lookup and assign onto every source instance
///
/// Every source field named by the relation is written, match or not, so a
/// requested hop never leaves the unloaded sentinel behind.
fn attach(
    items: &mut [Box<dyn AnyRecord>],
    relation: &RelationDescriptor,
    target: &TableEntry,
    children: Vec<Box<dyn AnyRecord>>,
) -> OrmResult<()> {
    let foreign_field = target
        .field_by_column(&relation.foreign_column)
        .ok_or_else(|| OrmError::UnknownField {
            table: target.table.clone(),
            field: relation.foreign_column.clone(),
        })?
        .field_name
        .clone();

    match relation.kind {
        RelationKind::BelongsTo | RelationKind::HasOne => {
            // Well-formed foreign keys are unique here; if not, last write wins.
            let mut lookup: HashMap<SqlValue, Box<dyn AnyRecord>> = HashMap::new();
            for child in children {
                let key = child.value_of(&foreign_field)?;
                lookup.insert(key, child);
            }
            for item in items.iter_mut() {
                let key = item.value_of(&relation.local_field)?;
                let value = if key.is_null() {
                    None
                } else {
                    lookup.get(&key).map(|child| child.clone_box())
                };
                item.set_related(&relation.name, RelatedValue::One(value))?;
            }
        }
        RelationKind::HasMany => {
            let mut lookup: HashMap<SqlValue, Vec<Box<dyn AnyRecord>>> = HashMap::new();
            for child in children {
                let key = child.value_of(&foreign_field)?;
                lookup.entry(key).or_default().push(child);
            }
            for item in items.iter_mut() {
                let key = item.value_of(&relation.local_field)?;
                let value = if key.is_null() {
                    Vec::new()
                } else {
                    lookup
                        .get(&key)
                        .map(|group| group.iter().map(|child| child.clone_box()).collect())
                        .unwrap_or_default()
                };
                item.set_related(&relation.name, RelatedValue::Many(value))?;
            }
        }
    }
    Ok(())
}
