mod column;
pub use column::{AutoIncrement, Column};

mod data_set;
pub use data_set::DataSet;

mod relation;
pub use relation::Relation;

mod row;
pub use row::{Row, RowState, RowVersion};

mod table;
pub use table::{LoadOption, Table, UniqueConstraint};

mod ty;
pub use ty::Type;
