#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
	#[error("Unknown field '{field}' for table {table}.")]
	UnknownField { table: &'static str, field: String },
	#[error("Operator {operator} is not supported for field '{field}'.")]
	UnsupportedOperator { field: String, operator: &'static str },
	#[error("Field '{field}' expects a {expected} value, got {found}.")]
	TypeMismatch { field: String, expected: &'static str, found: &'static str },
	#[error("Range for field '{field}' has a lower bound above its upper bound.")]
	MalformedRange { field: String },
	#[error("Membership list for field '{field}' is empty.")]
	EmptyMembership { field: String },
	#[error("Membership list for field '{field}' exceeds {max} values.")]
	TooManyValues { field: String, max: usize },
	#[error("Substring pattern for field '{field}' is empty.")]
	EmptyPattern { field: String },
	#[error("Sort specification has {fields} fields but {directions} directions.")]
	SortLengthMismatch { fields: usize, directions: usize },
	#[error("Field '{field}' is not sortable for table {table}.")]
	UnknownSortField { table: &'static str, field: String },
	#[error("Sort direction '{0}' must be asc or desc.")]
	InvalidSortDirection(String),
	#[error("Invalid pagination: {message}")]
	InvalidPagination { message: String },
	#[error("Pagination window is required at composition time.")]
	MissingPagination,
	#[error("Composed query has no aggregates.")]
	EmptyQuery,
	#[error("Aggregate {child} cannot be joined under root {root}.")]
	UnsupportedLink { root: &'static str, child: &'static str },
	#[error("Aggregate {0} appears more than once in the composed query.")]
	DuplicateAggregate(&'static str),
	#[error("Statement has {placeholders} placeholders but {args} arguments.")]
	PlaceholderMismatch { placeholders: usize, args: usize },
}
