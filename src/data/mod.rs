//! Data layer.
//!
//! Schemas describe which indices each variable has, providers store plain
//! keyed values, and interfaces give named-index access on top of them.

pub mod interface;
pub mod provider;
pub mod radix;
pub mod row_index;
pub mod schema;

pub use interface::{
    ConcreteDataInterface, ConstrainedDataInterface, DataInterface, DefaultPolicy,
    DefaultingDataInterface, IdentifierTranslatingDataInterface, InferencingDataInterface,
};
pub use provider::{CsvDataProvider, DataProvider, DataStore, RamDataProvider};
pub use radix::radix_product;
pub use row_index::RowIndex;
pub use schema::Schema;
