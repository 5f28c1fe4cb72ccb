pub mod dataset;
pub use dataset::DataSet;

pub mod driver;
pub use driver::Connection;

mod error;
pub use error::Error;

pub mod value;
pub use value::Value;

/// A Result type alias that uses Rowset's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

pub use async_trait::async_trait;
