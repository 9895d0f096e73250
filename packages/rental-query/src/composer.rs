use std::fmt::Write as _;

use crate::{
	Error, Result,
	builder::{Fragments, PLACEHOLDER, PredicateBuilder},
	catalog::{self, Aggregate, TableSchema},
	predicate::PredicateSet,
	value::{SqlArg, SqlValue},
};

/// One aggregate's filter inside a composed query.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateQuery {
	pub aggregate: Aggregate,
	pub predicates: PredicateSet,
}
impl AggregateQuery {
	pub fn new(aggregate: Aggregate, predicates: PredicateSet) -> Self {
		Self { aggregate, predicates }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
	Asc,
	Desc,
}
impl Direction {
	pub fn parse(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"asc" => Ok(Self::Asc),
			"desc" => Ok(Self::Desc),
			_ => Err(Error::InvalidSortDirection(raw.to_string())),
		}
	}

	pub fn as_sql(self) -> &'static str {
		match self {
			Self::Asc => "ASC",
			Self::Desc => "DESC",
		}
	}
}

/// Parallel field/direction lists as supplied by the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortSpec {
	pub fields: Vec<String>,
	pub directions: Vec<String>,
}
impl SortSpec {
	pub fn new(fields: Vec<String>, directions: Vec<String>) -> Self {
		Self { fields, directions }
	}

	pub fn single(field: impl Into<String>, direction: impl Into<String>) -> Self {
		Self { fields: vec![field.into()], directions: vec![direction.into()] }
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty() && self.directions.is_empty()
	}

	fn resolve(&self, schema: &'static TableSchema) -> Result<Vec<(String, Direction)>> {
		if self.fields.len() != self.directions.len() {
			return Err(Error::SortLengthMismatch {
				fields: self.fields.len(),
				directions: self.directions.len(),
			});
		}

		self.fields
			.iter()
			.zip(&self.directions)
			.map(|(name, direction)| {
				let field = schema
					.field(name.trim())
					.filter(|field| field.sortable)
					.ok_or_else(|| Error::UnknownSortField { table: schema.table, field: name.clone() })?;

				Ok((schema.column(field), Direction::parse(direction)?))
			})
			.collect()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
	pub limit: u32,
	pub offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageBounds {
	pub max_limit: u32,
	pub max_offset: u32,
}
impl PageBounds {
	fn check(&self, page: Page) -> Result<()> {
		if page.limit == 0 || page.limit > self.max_limit {
			return Err(Error::InvalidPagination {
				message: format!("limit must be between 1 and {}.", self.max_limit),
			});
		}
		if page.offset > self.max_offset {
			return Err(Error::InvalidPagination {
				message: format!("offset must not exceed {}.", self.max_offset),
			});
		}

		Ok(())
	}
}

/// Aggregates ordered with the root last, plus sort and pagination.
#[derive(Clone, Debug, PartialEq)]
pub struct ComposedQuery {
	pub aggregates: Vec<AggregateQuery>,
	pub sort: SortSpec,
	pub page: Option<Page>,
}
impl ComposedQuery {
	pub fn root(&self) -> Option<Aggregate> {
		self.aggregates.last().map(|query| query.aggregate)
	}
}

/// Executable SQL with `$n` markers and the values to bind, in marker order.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
	pub sql: String,
	pub args: Vec<SqlValue>,
}

#[derive(Clone, Copy, Debug)]
pub struct QueryComposer {
	bounds: PageBounds,
}
impl QueryComposer {
	pub fn new(bounds: PageBounds) -> Self {
		Self { bounds }
	}

	/// Page query: root ids plus `total_count` from a window over the unlimited result.
	pub fn compose(&self, query: &ComposedQuery) -> Result<Statement> {
		let root = query.root().ok_or(Error::EmptyQuery)?;
		let schema = root.schema();
		let order = query.sort.resolve(schema)?;
		let page = query.page.ok_or(Error::MissingPagination)?;

		self.bounds.check(page)?;

		let fragments = where_fragments(query)?;
		let mut sql = format!(
			"SELECT {table}.id, COUNT(*) OVER() AS total_count\nFROM {table}",
			table = schema.table
		);

		push_where(&mut sql, &fragments);

		if !order.is_empty() {
			let rendered: Vec<String> = order
				.iter()
				.map(|(column, direction)| format!("{column} {}", direction.as_sql()))
				.collect();

			let _ = write!(sql, "\nORDER BY {}", rendered.join(", "));
		}

		let _ = write!(sql, "\nLIMIT {} OFFSET {}", page.limit, page.offset);

		renumber(&sql, fragments.into_args())
	}

	/// Count-only query over the same predicates, without sort or pagination.
	pub fn compose_count(&self, query: &ComposedQuery) -> Result<Statement> {
		let root = query.root().ok_or(Error::EmptyQuery)?;
		let fragments = where_fragments(query)?;
		let mut sql = format!("SELECT COUNT(*) AS total_count\nFROM {}", root.table());

		push_where(&mut sql, &fragments);

		renumber(&sql, fragments.into_args())
	}
}

fn where_fragments(query: &ComposedQuery) -> Result<Fragments> {
	let Some((root, children)) = query.aggregates.split_last() else {
		return Err(Error::EmptyQuery);
	};
	let root_table = root.aggregate.table();
	let mut fragments = PredicateBuilder::for_aggregate(root.aggregate).build(&root.predicates)?;
	let mut seen = vec![root.aggregate];

	for child in children {
		if seen.contains(&child.aggregate) {
			return Err(Error::DuplicateAggregate(child.aggregate.as_str()));
		}

		seen.push(child.aggregate);

		let link = catalog::link(root.aggregate, child.aggregate).ok_or(Error::UnsupportedLink {
			root: root.aggregate.as_str(),
			child: child.aggregate.as_str(),
		})?;
		let correlation = link.correlate(root_table, child.aggregate.table());

		if let Some(exists) = PredicateBuilder::for_aggregate(child.aggregate)
			.build_exists(&child.predicates, &correlation)?
		{
			fragments.append(exists);
		}
	}

	Ok(fragments)
}

fn push_where(sql: &mut String, fragments: &Fragments) {
	if fragments.is_empty() {
		return;
	}

	sql.push_str("\nWHERE ");
	sql.push_str(&fragments.joined());
}

/// Replaces each canonical placeholder, left to right, with the next positional marker.
///
/// A membership argument expands its single placeholder into one marker per value.
pub(crate) fn renumber(sql: &str, args: Vec<SqlArg>) -> Result<Statement> {
	let placeholders = sql.chars().filter(|ch| *ch == PLACEHOLDER).count();

	if placeholders != args.len() {
		return Err(Error::PlaceholderMismatch { placeholders, args: args.len() });
	}

	let mut out = String::with_capacity(sql.len() + args.len() * 2);
	let mut bound = Vec::with_capacity(args.len());
	let mut pending = args.into_iter();

	for ch in sql.chars() {
		if ch != PLACEHOLDER {
			out.push(ch);

			continue;
		}

		let Some(arg) = pending.next() else {
			return Err(Error::PlaceholderMismatch { placeholders, args: bound.len() });
		};
		let values = match arg {
			SqlArg::Scalar(value) => vec![value],
			SqlArg::List(values) => values,
		};

		for (idx, value) in values.into_iter().enumerate() {
			if idx > 0 {
				out.push_str(", ");
			}

			bound.push(value);

			let _ = write!(out, "${}", bound.len());
		}
	}

	Ok(Statement { sql: out, args: bound })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn composer() -> QueryComposer {
		QueryComposer::new(PageBounds { max_limit: 100, max_offset: 10_000 })
	}

	fn page(limit: u32, offset: u32) -> Option<Page> {
		Some(Page { limit, offset })
	}

	#[test]
	fn empty_filters_produce_no_where() {
		let query = ComposedQuery {
			aggregates: vec![
				AggregateQuery::new(Aggregate::Property, PredicateSet::new()),
				AggregateQuery::new(Aggregate::Listing, PredicateSet::new()),
			],
			sort: SortSpec::single("created_at", "desc"),
			page: page(2, 0),
		};
		let statement = composer().compose(&query).expect("compose");

		assert_eq!(
			statement.sql,
			"SELECT listings.id, COUNT(*) OVER() AS total_count\nFROM listings\nORDER BY listings.created_at DESC\nLIMIT 2 OFFSET 0"
		);
		assert!(statement.args.is_empty());
	}

	#[test]
	fn child_filters_become_exists_clauses() {
		let query = ComposedQuery {
			aggregates: vec![
				AggregateQuery::new(Aggregate::Property, PredicateSet::new().eq("city", "HCM")),
				AggregateQuery::new(
					Aggregate::Listing,
					PredicateSet::new().at_least("price", 1_000_000_i64).at_most("price", 5_000_000_i64),
				),
			],
			sort: SortSpec::default(),
			page: page(20, 40),
		};
		let statement = composer().compose(&query).expect("compose");

		assert_eq!(
			statement.sql,
			"SELECT listings.id, COUNT(*) OVER() AS total_count\nFROM listings\nWHERE listings.price >= $1 AND listings.price <= $2 AND EXISTS (SELECT 1 FROM properties WHERE properties.id = listings.property_id AND properties.city = $3)\nLIMIT 20 OFFSET 40"
		);
		assert_eq!(
			statement.args,
			vec![SqlValue::Int(1_000_000), SqlValue::Int(5_000_000), SqlValue::from("HCM")]
		);
	}

	#[test]
	fn membership_expands_markers() {
		let query = ComposedQuery {
			aggregates: vec![AggregateQuery::new(
				Aggregate::Listing,
				PredicateSet::new().one_of("lease_term_months", [6_i64, 12]).eq("active", true),
			)],
			sort: SortSpec::default(),
			page: page(10, 0),
		};
		let statement = composer().compose_count(&query).expect("compose");

		assert_eq!(
			statement.sql,
			"SELECT COUNT(*) AS total_count\nFROM listings\nWHERE listings.lease_term_months IN ($1, $2) AND listings.active = $3"
		);
		assert_eq!(statement.args.len(), 3);
	}

	#[test]
	fn sort_mismatch_is_rejected() {
		let query = ComposedQuery {
			aggregates: vec![AggregateQuery::new(Aggregate::Listing, PredicateSet::new())],
			sort: SortSpec::new(vec!["price".to_string(), "created_at".to_string()], vec![
				"asc".to_string(),
			]),
			page: page(10, 0),
		};

		assert_eq!(
			composer().compose(&query),
			Err(Error::SortLengthMismatch { fields: 2, directions: 1 })
		);
	}

	#[test]
	fn pagination_is_required_and_bounded() {
		let mut query = ComposedQuery {
			aggregates: vec![AggregateQuery::new(Aggregate::Listing, PredicateSet::new())],
			sort: SortSpec::default(),
			page: None,
		};

		assert_eq!(composer().compose(&query), Err(Error::MissingPagination));

		query.page = page(0, 0);

		assert!(matches!(composer().compose(&query), Err(Error::InvalidPagination { .. })));

		query.page = page(10, 10_001);

		assert!(matches!(composer().compose(&query), Err(Error::InvalidPagination { .. })));
	}

	#[test]
	fn unsupported_and_duplicate_links_are_rejected() {
		let query = ComposedQuery {
			aggregates: vec![
				AggregateQuery::new(Aggregate::Listing, PredicateSet::new()),
				AggregateQuery::new(Aggregate::Unit, PredicateSet::new()),
			],
			sort: SortSpec::default(),
			page: page(10, 0),
		};

		assert_eq!(
			composer().compose(&query),
			Err(Error::UnsupportedLink { root: "unit", child: "listing" })
		);

		let query = ComposedQuery {
			aggregates: vec![
				AggregateQuery::new(Aggregate::Property, PredicateSet::new()),
				AggregateQuery::new(Aggregate::Property, PredicateSet::new()),
				AggregateQuery::new(Aggregate::Listing, PredicateSet::new()),
			],
			sort: SortSpec::default(),
			page: page(10, 0),
		};

		assert_eq!(composer().compose(&query), Err(Error::DuplicateAggregate("property")));
	}

	#[test]
	fn renumber_detects_count_drift() {
		let err = renumber("a = ? AND b = ?", vec![SqlArg::Scalar(SqlValue::Int(1))])
			.expect_err("Expected error.");

		assert_eq!(err, Error::PlaceholderMismatch { placeholders: 2, args: 1 });
	}
}
