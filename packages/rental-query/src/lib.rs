//! Pure query composition for the rental search layer.
//!
//! Nothing in this crate performs I/O. A [`PredicateSet`] describes the sparse filter for one
//! aggregate, [`PredicateBuilder`] turns it into SQL fragments with canonical `?` placeholders,
//! and [`QueryComposer`] joins the aggregates through correlated `EXISTS` subqueries and
//! renumbers the placeholders into positional `$n` markers in one final pass.

pub mod builder;
pub mod catalog;
pub mod composer;
pub mod predicate;
pub mod value;

mod error;

pub use builder::{Fragments, PredicateBuilder};
pub use catalog::{Aggregate, FieldDef, FieldKind, Link, RelatedDef, TableSchema};
pub use composer::{
	AggregateQuery, ComposedQuery, Direction, Page, PageBounds, QueryComposer, SortSpec, Statement,
};
pub use error::Error;
pub use predicate::{Constraint, PredicateSet};
pub use value::SqlValue;

pub type Result<T, E = Error> = std::result::Result<T, E>;
