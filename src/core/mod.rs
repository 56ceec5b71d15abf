//! Core data types: CSV tables and boundary geometry.

pub mod boundary;
pub mod table;

pub use boundary::{BoundaryError, GeoBoundary};
pub use table::{IdSet, SampleId, Table, TableError};
