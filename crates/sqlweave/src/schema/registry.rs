use super::table::{self, TableMetadata};
use super::Model;
use crate::error::{OrmError, OrmResult};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, OnceLock, PoisonError, RwLock};

type Slot = Arc<OnceLock<Result<Arc<TableMetadata>, String>>>;

/// Cache of table metadata keyed by model type.
///
/// Each type is built at most once, even under concurrent first use; a
/// declaration error is cached and returned on every later lookup.
#[derive(Default)]
pub struct Registry {
    tables: RwLock<HashMap<TypeId, Slot>>,
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// The process-wide registry used by the query builders.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for `T`, building it on first use.
    pub fn describe<T: Model>(&self) -> OrmResult<Arc<TableMetadata>> {
        let slot = self.slot(TypeId::of::<T>());
        slot.get_or_init(|| table::build(T::model_def()).map(Arc::new))
            .clone()
            .map_err(OrmError::Config)
    }

    /// Metadata for a type that was already described, if any.
    pub fn get(&self, type_id: TypeId) -> Option<Arc<TableMetadata>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.get(&type_id)?.get()?.as_ref().ok().cloned()
    }

    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every cached table.
    pub fn clear(&self) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn slot(&self, type_id: TypeId) -> Slot {
        if let Some(slot) = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
        {
            return Arc::clone(slot);
        }
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(tables.entry(type_id).or_default())
    }
}
