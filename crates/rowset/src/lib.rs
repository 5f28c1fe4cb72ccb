mod adapter;
pub use adapter::{DataAdapter, FillErrorHook, UpdateHook, UpdateTarget};

mod batch;

mod fill;

mod guard;

pub mod mapping;
pub use mapping::{
    ColumnMapping, MissingMappingAction, MissingSchemaAction, SchemaType, TableMapping,
};

mod reader;

mod schema;

mod update;
pub use update::{UpdateEvent, UpdateStatus};

pub use rowset_core::{
    dataset::{self, DataSet, LoadOption, Table},
    driver, value, Error, Result,
};

pub use tokio_util::sync::CancellationToken;
