//! Execution boundary and caller-facing operations
//!
//! `Executor` is the single seam everything runs through: one required
//! method executes a statement and returns decoded rows, and the whole
//! operation surface (fetch, insert, update, delete, prefetch) is provided
//! on top of it. `Database` and `Transaction` both implement it, so every
//! operation works inside and outside a transaction alike.

use async_trait::async_trait;

use crate::conditions::Criterion;
use crate::error::{OrmError, OrmResult};
use crate::loader;
use crate::record::{downcast_record, AnyRecord, Record};
use crate::row::RawRow;
use crate::schema::registry;
use crate::schema::RelationPath;
use crate::statement::{self, FetchOptions, Statement};

#[async_trait]
pub trait Executor: Send + Sync {
    /// Run one statement and return its decoded rows
    async fn fetch_rows(&self, statement: Statement) -> OrmResult<Vec<RawRow>>;

    /// Run one statement, keeping at most the first row
    async fn fetch_row(&self, statement: Statement) -> OrmResult<Option<RawRow>> {
        Ok(self.fetch_rows(statement).await?.into_iter().next())
    }

    /// Fetch every row matching the criterion
    async fn fetch_all<T: Record>(
        &self,
        criterion: Option<&Criterion>,
        options: &FetchOptions,
        prefetch: &[&str],
    ) -> OrmResult<Vec<T>>
    where
        Self: Sized,
    {
        let entry = registry::entry::<T>()?;
        let rows = self
            .fetch_rows(statement::select(&entry, criterion, options))
            .await?;
        let records = rows.iter().map(T::from_row).collect::<OrmResult<Vec<T>>>()?;
        self.fetch_related(records, prefetch).await
    }

    /// Fetch the single row matching the criterion
    ///
    /// Zero rows is `NoResultsReturned`, more than one is
    /// `MultipleResultsReturned`.
    async fn fetch_one<T: Record>(&self, criterion: &Criterion, prefetch: &[&str]) -> OrmResult<T>
    where
        Self: Sized,
    {
        let entry = registry::entry::<T>()?;
        // Two rows are enough to tell "one" from "many".
        let options = FetchOptions::new().limit(2);
        let rows = self
            .fetch_rows(statement::select(&entry, Some(criterion), &options))
            .await?;
        if rows.len() > 1 {
            return Err(OrmError::MultipleResultsReturned {
                table: entry.table.clone(),
            });
        }
        let row = rows.first().ok_or_else(|| OrmError::NoResultsReturned {
            table: entry.table.clone(),
        })?;
        let record = T::from_row(row)?;
        fetch_related_single(self, record, prefetch).await
    }

    /// Fetch the first matching row, or `None`; never errors on cardinality
    async fn fetch_first<T: Record>(
        &self,
        criterion: Option<&Criterion>,
        prefetch: &[&str],
    ) -> OrmResult<Option<T>>
    where
        Self: Sized,
    {
        let entry = registry::entry::<T>()?;
        let options = FetchOptions::new().limit(1);
        let rows = self
            .fetch_rows(statement::select(&entry, criterion, &options))
            .await?;
        match rows.first() {
            None => Ok(None),
            Some(row) => {
                let record = T::from_row(row)?;
                Ok(Some(fetch_related_single(self, record, prefetch).await?))
            }
        }
    }

    /// Insert one instance and return its authoritative post-write state
    async fn insert_one<T: Record>(&self, item: &T, prefetch: &[&str]) -> OrmResult<T>
    where
        Self: Sized,
    {
        let entry = registry::entry::<T>()?;
        let rows = self
            .fetch_rows(statement::insert(&entry, vec![insertable_values(&entry, item)?])?)
            .await?;
        let row = rows.first().ok_or_else(|| OrmError::NoResultsReturned {
            table: entry.table.clone(),
        })?;
        let record = T::from_row(row)?;
        fetch_related_single(self, record, prefetch).await
    }

    /// Insert a batch with one statement; empty input issues nothing
    async fn insert_many<T: Record>(&self, items: &[T], prefetch: &[&str]) -> OrmResult<Vec<T>>
    where
        Self: Sized,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let entry = registry::entry::<T>()?;
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            rows.push(insertable_values(&entry, item)?);
        }
        let result_rows = self.fetch_rows(statement::insert(&entry, rows)?).await?;
        let records = result_rows
            .iter()
            .map(T::from_row)
            .collect::<OrmResult<Vec<T>>>()?;
        self.fetch_related(records, prefetch).await
    }

    /// Update one instance, keyed on its current primary key value
    async fn update_one<T: Record>(&self, item: &T, prefetch: &[&str]) -> OrmResult<T>
    where
        Self: Sized,
    {
        let entry = registry::entry::<T>()?;
        let rows = self
            .fetch_rows(statement::update_by_primary_key(&entry, item.values()?)?)
            .await?;
        let row = rows.first().ok_or_else(|| OrmError::NoResultsReturned {
            table: entry.table.clone(),
        })?;
        let record = T::from_row(row)?;
        fetch_related_single(self, record, prefetch).await
    }

    /// Delete every row matching the criterion, returning the removed rows
    async fn delete_where<T: Record>(&self, criterion: &Criterion) -> OrmResult<Vec<T>>
    where
        Self: Sized,
    {
        let entry = registry::entry::<T>()?;
        let rows = self.fetch_rows(statement::delete(&entry, criterion)).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Count rows matching the criterion
    async fn count<T: Record>(&self, criterion: Option<&Criterion>) -> OrmResult<i64>
    where
        Self: Sized,
    {
        let entry = registry::entry::<T>()?;
        let rows = self.fetch_rows(statement::count(&entry, criterion)).await?;
        let row = rows.first().ok_or_else(|| OrmError::NoResultsReturned {
            table: entry.table.clone(),
        })?;
        row.try_get("count")
    }

    /// Load relationship paths onto an already fetched batch
    ///
    /// Consumes the batch and returns it with every requested path loaded;
    /// unmatched to-one hops become explicit `None`, unmatched to-many hops
    /// empty collections.
    async fn fetch_related<T: Record>(&self, items: Vec<T>, paths: &[&str]) -> OrmResult<Vec<T>>
    where
        Self: Sized,
    {
        if paths.is_empty() {
            return Ok(items);
        }
        let entry = registry::entry::<T>()?;
        let parsed: Vec<RelationPath> = paths.iter().map(|p| RelationPath::parse(p)).collect();

        let mut boxed: Vec<Box<dyn AnyRecord>> = items
            .into_iter()
            .map(|item| Box::new(item) as Box<dyn AnyRecord>)
            .collect();
        loader::load_related(self, &entry, &mut boxed, &parsed).await?;

        let mut out = Vec::with_capacity(boxed.len());
        for item in boxed {
            out.push(*downcast_record::<T>(item)?);
        }
        Ok(out)
    }
}

/// Prefetch helper for the single-record operations
async fn fetch_related_single<T: Record, E: Executor>(
    executor: &E,
    record: T,
    paths: &[&str],
) -> OrmResult<T> {
    let mut loaded = executor.fetch_related(vec![record], paths).await?;
    match loaded.pop() {
        Some(record) => Ok(record),
        // fetch_related preserves batch length; this cannot fire
        None => Err(OrmError::NoResultsReturned {
            table: registry::entry::<T>()?.table.clone(),
        }),
    }
}

fn insertable_values<T: Record>(
    entry: &crate::schema::TableEntry,
    item: &T,
) -> OrmResult<Vec<crate::value::SqlValue>> {
    let values = item.values()?;
    if values.len() != entry.fields.len() {
        return Err(OrmError::schema(
            entry.type_name,
            format!(
                "values() returned {} values for {} declared fields",
                values.len(),
                entry.fields.len()
            ),
        ));
    }
    Ok(values
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !entry.fields[*i].generated)
        .map(|(_, value)| value)
        .collect())
}
