//! Filter, sort and page primitives shared by instance listing and history
//! loading.

pub mod fields;
pub mod filter;
pub mod page;
pub mod predicate;
pub mod sort;

pub use fields::{FieldValue, Queryable};
pub use filter::{FilterClause, FilterOperator, FilterValue, Literal};
pub use page::{PageStep, Pager, page};
pub use sort::{SortDirection, SortSpec, sort_records};
