//! On-disk B+Tree storage: pages, nodes, rows and the table built on top of them.
pub mod btree;
pub mod cursor;
pub mod pager;
pub mod row;
pub mod table;

pub use row::Row;
pub use table::Table;
