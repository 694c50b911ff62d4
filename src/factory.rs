//! Registry of table engines by name.

use std::{
    any::Any,
    collections::BTreeMap,
    fmt,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::{
    id::TableId,
    observability::log_debug,
    option::TableOptions,
    query::CreateQuery,
    schema::{ColumnsDescription, ConstraintsDescription},
    table::{AggregatingMemory, CreateError, ENGINE_NAME},
};

/// Error returned by a [`StorageFactory`]
#[derive(Debug, Error)]
pub enum FactoryError {
    /// No engine is registered under the name.
    #[error("unknown table engine {0}")]
    UnknownEngine(String),
    /// An engine is already registered under the name.
    #[error("table engine {0} is already registered")]
    DuplicateEngine(String),
    /// The engine takes no arguments but some were given.
    #[error("Engine {engine} doesn't support any arguments ({given} given)")]
    UnexpectedArguments {
        /// Engine name as written.
        engine: String,
        /// Number of arguments given.
        given: usize,
    },
    /// The engine rejected the table definition.
    #[error(transparent)]
    Create(#[from] CreateError),
}

/// Capabilities an engine declares when registering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageFeatures {
    /// Several write sessions may append to one table at once.
    pub supports_parallel_insert: bool,
}

/// Everything a `CREATE TABLE ... ENGINE = name(args)` hands to an engine.
#[derive(Debug, Clone)]
pub struct StorageArgs {
    /// Engine to create the table with.
    pub engine_name: String,
    /// Arguments in `ENGINE = name(...)`.
    pub engine_args: Vec<String>,
    /// Identity of the new table.
    pub table_id: TableId,
    /// Declared columns.
    pub columns: ColumnsDescription,
    /// Declared constraints.
    pub constraints: ConstraintsDescription,
    /// The create statement.
    pub query: CreateQuery,
    /// Engine settings.
    pub options: TableOptions,
}

/// A created table, as seen by the catalog.
pub trait StorageEngine: fmt::Debug + Send + Sync {
    /// Name the engine is registered under.
    fn engine_name(&self) -> &'static str;

    /// Identity of the table.
    fn table_id(&self) -> &TableId;

    /// Advisory row count, `None` when the engine cannot tell cheaply.
    fn total_rows(&self) -> Option<u64>;

    /// Advisory byte count, `None` when the engine cannot tell cheaply.
    fn total_bytes(&self) -> Option<u64>;

    /// Downcast to the concrete engine.
    fn as_any(&self) -> &dyn Any;
}

impl StorageEngine for AggregatingMemory {
    fn engine_name(&self) -> &'static str {
        self.name()
    }

    fn table_id(&self) -> &TableId {
        self.id()
    }

    fn total_rows(&self) -> Option<u64> {
        AggregatingMemory::total_rows(self)
    }

    fn total_bytes(&self) -> Option<u64> {
        AggregatingMemory::total_bytes(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type Creator =
    Arc<dyn Fn(StorageArgs) -> Result<Arc<dyn StorageEngine>, FactoryError> + Send + Sync>;

struct Registration {
    creator: Creator,
    features: StorageFeatures,
}

/// Table engines by name.
#[derive(Default)]
pub struct StorageFactory {
    storages: RwLock<BTreeMap<String, Registration>>,
}

static INSTANCE: Lazy<StorageFactory> = Lazy::new(|| {
    let (features, creator) = aggregating_memory_registration();
    let mut storages = BTreeMap::new();
    storages.insert(ENGINE_NAME.to_string(), Registration { creator, features });
    StorageFactory {
        storages: RwLock::new(storages),
    }
});

impl StorageFactory {
    /// Process-wide factory with the built-in engines registered.
    pub fn instance() -> &'static StorageFactory {
        &INSTANCE
    }

    // Every write is a single map insert, so a panicking holder cannot leave
    // the map half-updated and poisoning is safe to ignore.
    fn read_storages(&self) -> RwLockReadGuard<'_, BTreeMap<String, Registration>> {
        self.storages.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_storages(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Registration>> {
        self.storages.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `creator` under `name`. Fails if the name is taken.
    pub fn register_storage<F>(
        &self,
        name: &str,
        features: StorageFeatures,
        creator: F,
    ) -> Result<(), FactoryError>
    where
        F: Fn(StorageArgs) -> Result<Arc<dyn StorageEngine>, FactoryError> + Send + Sync + 'static,
    {
        let mut storages = self.write_storages();
        if storages.contains_key(name) {
            return Err(FactoryError::DuplicateEngine(name.to_string()));
        }
        storages.insert(
            name.to_string(),
            Registration {
                creator: Arc::new(creator),
                features,
            },
        );
        log_debug!(
            component = "factory",
            event = "engine_registered",
            engine = name,
            supports_parallel_insert = features.supports_parallel_insert,
        );
        Ok(())
    }

    /// Features declared by the engine `name`, if registered.
    pub fn features(&self, name: &str) -> Option<StorageFeatures> {
        self.read_storages()
            .get(name)
            .map(|registration| registration.features)
    }

    /// Registered engine names in sorted order.
    pub fn engine_names(&self) -> Vec<String> {
        self.read_storages().keys().cloned().collect()
    }

    /// Create a table with the engine named in `args`.
    pub fn get(&self, args: StorageArgs) -> Result<Arc<dyn StorageEngine>, FactoryError> {
        let creator = self
            .read_storages()
            .get(&args.engine_name)
            .map(|registration| Arc::clone(&registration.creator))
            .ok_or_else(|| FactoryError::UnknownEngine(args.engine_name.clone()))?;
        creator(args)
    }
}

impl fmt::Debug for StorageFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageFactory")
            .field("engines", &self.engine_names())
            .finish()
    }
}

/// Register the `AggregatingMemory` engine. It accepts no engine arguments
/// and supports parallel inserts.
pub fn register_aggregating_memory(factory: &StorageFactory) -> Result<(), FactoryError> {
    let (features, creator) = aggregating_memory_registration();
    factory.register_storage(ENGINE_NAME, features, move |args| creator(args))
}

fn aggregating_memory_registration() -> (StorageFeatures, Creator) {
    let creator: Creator = Arc::new(|args: StorageArgs| {
        if !args.engine_args.is_empty() {
            return Err(FactoryError::UnexpectedArguments {
                engine: args.engine_name,
                given: args.engine_args.len(),
            });
        }
        let table = AggregatingMemory::new(
            args.table_id,
            args.columns,
            args.constraints,
            &args.query,
            args.options,
        )?;
        Ok(Arc::new(table) as Arc<dyn StorageEngine>)
    });
    (
        StorageFeatures {
            supports_parallel_insert: true,
        },
        creator,
    )
}
