mod batch;
pub use batch::BatchExecutor;

mod command;
pub use command::{Command, Parameter, ParameterDirection, StatementType, WriteFeedback};

mod connection;
pub use connection::{shared, Connection, ConnectionState, SharedConnection};

mod row_source;
pub use row_source::{RowSource, SchemaColumn};
