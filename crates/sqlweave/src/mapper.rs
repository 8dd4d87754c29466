//! Routing of result columns into model records.
//!
//! A column maps to a model field by column name (case-insensitive; embedded
//! struct columns carry their prefix). A `<relation>__<column>` name maps into
//! the to-one relation of that name, recursively. Anything else is an error:
//! scanning into a struct never drops data silently.

use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::relation::JUNCTION_ALIAS;
use crate::row::Row;
use crate::schema::{Model, TableMetadata, registry};

/// Record paths for the columns of one result set.
#[derive(Debug)]
pub(crate) struct ScanPlan {
    targets: Vec<Vec<String>>,
}

impl ScanPlan {
    pub(crate) fn build(table: &TableMetadata, columns: &[String]) -> OrmResult<Self> {
        let junction = format!("{JUNCTION_ALIAS}__");
        let targets = columns
            .iter()
            .map(|column| {
                if column.starts_with(&junction) {
                    return Ok(vec![column.clone()]);
                }
                locate(table, column)?.ok_or_else(|| OrmError::UnknownColumn {
                    model: table.type_name.to_string(),
                    column: column.clone(),
                })
            })
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(Self { targets })
    }

    pub(crate) fn record(&self, row: &Row) -> Record {
        let mut record = Record::new();
        for (path, value) in self.targets.iter().zip(row.values()) {
            record.set_path(path, value.clone());
        }
        record
    }
}

fn locate(table: &TableMetadata, column: &str) -> OrmResult<Option<Vec<String>>> {
    if let Some(field) = table.field_by_column(column) {
        return Ok(Some(field.path.iter().map(|s| s.to_string()).collect()));
    }
    let Some((head, rest)) = column.split_once("__") else {
        return Ok(None);
    };
    let Some(relation) = table.relation(head).filter(|r| r.kind.is_to_one()) else {
        return Ok(None);
    };
    let resolved = relation.resolve(registry(), table)?;
    Ok(locate(&resolved.target, rest)?.map(|mut path| {
        path.insert(0, relation.name.clone());
        path
    }))
}

/// Map one row into a model, as `#[derive(Model)]`'s `FromRow` impl does.
pub fn scan_model<T: Model>(row: &Row) -> OrmResult<T> {
    let table = registry().describe::<T>()?;
    let plan = ScanPlan::build(&table, row.columns())?;
    T::from_record(plan.record(row))
}
