use crate::{
	Error, Result,
	catalog::{Aggregate, FieldDef, TableSchema},
	predicate::{Constraint, PredicateSet},
	value::{SqlArg, SqlValue},
};

/// Canonical placeholder written into every fragment before renumbering.
pub const PLACEHOLDER: char = '?';

pub(crate) const MAX_IN_LIST_ITEMS: usize = 128;

/// Ordered SQL boolean fragments and the arguments their placeholders consume.
///
/// Fragments and arguments are only ever appended together, so argument order always matches
/// the left-to-right placeholder order of `clauses().join(" AND ")`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fragments {
	clauses: Vec<String>,
	args: Vec<SqlArg>,
}
impl Fragments {
	pub fn is_empty(&self) -> bool {
		self.clauses.is_empty()
	}

	pub fn clauses(&self) -> &[String] {
		&self.clauses
	}

	/// Bound values in placeholder order, with membership lists flattened.
	pub fn values(&self) -> Vec<SqlValue> {
		self.args.iter().flat_map(SqlArg::values).cloned().collect()
	}

	pub(crate) fn args(&self) -> &[SqlArg] {
		&self.args
	}

	pub(crate) fn joined(&self) -> String {
		self.clauses.join(" AND ")
	}

	pub(crate) fn push(&mut self, clause: String, args: impl IntoIterator<Item = SqlArg>) {
		self.clauses.push(clause);
		self.args.extend(args);
	}

	pub(crate) fn append(&mut self, other: Fragments) {
		self.clauses.extend(other.clauses);
		self.args.extend(other.args);
	}

	pub(crate) fn into_args(self) -> Vec<SqlArg> {
		self.args
	}

	/// Wraps `inner` into one correlated `EXISTS` fragment and appends it.
	pub(crate) fn push_exists(&mut self, table: &str, correlation: &str, inner: Fragments) {
		let clause = if inner.is_empty() {
			format!("EXISTS (SELECT 1 FROM {table} WHERE {correlation})")
		} else {
			format!("EXISTS (SELECT 1 FROM {table} WHERE {correlation} AND {})", inner.joined())
		};

		self.push(clause, inner.args);
	}
}

/// Translates a [`PredicateSet`] into fragments for one table.
#[derive(Clone, Copy, Debug)]
pub struct PredicateBuilder {
	schema: &'static TableSchema,
}
impl PredicateBuilder {
	pub fn new(schema: &'static TableSchema) -> Self {
		Self { schema }
	}

	pub fn for_aggregate(aggregate: Aggregate) -> Self {
		Self::new(aggregate.schema())
	}

	pub fn build(&self, set: &PredicateSet) -> Result<Fragments> {
		let mut out = Fragments::default();

		self.build_into(set, &mut out)?;

		Ok(out)
	}

	/// Existence-check mode: an empty set yields `None` rather than a bare `EXISTS`.
	pub fn build_exists(&self, set: &PredicateSet, correlation: &str) -> Result<Option<Fragments>> {
		if set.is_empty() {
			return Ok(None);
		}

		let inner = self.build(set)?;
		let mut out = Fragments::default();

		out.push_exists(self.schema.table, correlation, inner);

		Ok(Some(out))
	}

	/// Appends one fragment per bound (or per constraint) to the shared accumulator.
	pub fn build_into(&self, set: &PredicateSet, out: &mut Fragments) -> Result<()> {
		for (name, constraint) in set.iter() {
			if let Constraint::Exists(nested) = constraint {
				self.push_related(name, nested, out)?;

				continue;
			}

			let Some(field) = self.schema.field(name) else {
				return Err(self.reject_field(name, constraint));
			};

			self.push_field(field, constraint, out)?;
		}

		Ok(())
	}

	fn push_related(&self, name: &str, nested: &PredicateSet, out: &mut Fragments) -> Result<()> {
		let Some(related) = self.schema.related(name) else {
			return Err(match self.schema.field(name) {
				Some(_) => Error::UnsupportedOperator { field: name.to_string(), operator: "exists" },
				None => Error::UnknownField { table: self.schema.table, field: name.to_string() },
			});
		};
		let inner = PredicateBuilder::new(related.schema).build(nested)?;
		let correlation =
			format!("{}.{} = {}.id", related.schema.table, related.owning_key, self.schema.table);

		out.push_exists(related.schema.table, &correlation, inner);

		Ok(())
	}

	fn push_field(&self, field: &FieldDef, constraint: &Constraint, out: &mut Fragments) -> Result<()> {
		let column = self.schema.column(field);

		match constraint {
			Constraint::Eq(value) => {
				let value = coerce(field, value)?;

				out.push(format!("{column} = {PLACEHOLDER}"), [SqlArg::Scalar(value)]);
			},
			Constraint::Range { min, max } => {
				if !field.kind.supports_range() {
					return Err(unsupported(field, constraint));
				}

				let min = min.as_ref().map(|value| coerce(field, value)).transpose()?;
				let max = max.as_ref().map(|value| coerce(field, value)).transpose()?;

				if let (Some(lo), Some(hi)) = (&min, &max)
					&& lo.compare(hi).is_some_and(|ord| ord.is_gt())
				{
					return Err(Error::MalformedRange { field: field.name.to_string() });
				}
				if let Some(min) = min {
					out.push(format!("{column} >= {PLACEHOLDER}"), [SqlArg::Scalar(min)]);
				}
				if let Some(max) = max {
					out.push(format!("{column} <= {PLACEHOLDER}"), [SqlArg::Scalar(max)]);
				}
			},
			Constraint::In(values) => {
				if !field.kind.supports_membership() {
					return Err(unsupported(field, constraint));
				}
				if values.is_empty() {
					return Err(Error::EmptyMembership { field: field.name.to_string() });
				}
				if values.len() > MAX_IN_LIST_ITEMS {
					return Err(Error::TooManyValues {
						field: field.name.to_string(),
						max: MAX_IN_LIST_ITEMS,
					});
				}

				let values =
					values.iter().map(|value| coerce(field, value)).collect::<Result<Vec<_>>>()?;

				out.push(format!("{column} IN ({PLACEHOLDER})"), [SqlArg::List(values)]);
			},
			Constraint::Contains(needle) => {
				if !field.kind.supports_substring() {
					return Err(unsupported(field, constraint));
				}
				if needle.is_empty() {
					return Err(Error::EmptyPattern { field: field.name.to_string() });
				}

				let pattern = format!("%{}%", escape_like(needle));

				out.push(
					format!("{column} ILIKE {PLACEHOLDER}"),
					[SqlArg::Scalar(SqlValue::Text(pattern))],
				);
			},
			Constraint::Exists(_) => return Err(unsupported(field, constraint)),
		}

		Ok(())
	}

	fn reject_field(&self, name: &str, constraint: &Constraint) -> Error {
		if self.schema.related(name).is_some() {
			return Error::UnsupportedOperator {
				field: name.to_string(),
				operator: constraint.operator(),
			};
		}

		Error::UnknownField { table: self.schema.table, field: name.to_string() }
	}
}

fn coerce(field: &FieldDef, value: &SqlValue) -> Result<SqlValue> {
	value.coerce(field.kind).ok_or_else(|| Error::TypeMismatch {
		field: field.name.to_string(),
		expected: field.kind.as_str(),
		found: value.kind_label(),
	})
}

fn unsupported(field: &FieldDef, constraint: &Constraint) -> Error {
	Error::UnsupportedOperator { field: field.name.to_string(), operator: constraint.operator() }
}

/// Escapes LIKE metacharacters so the needle matches literally.
fn escape_like(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for ch in raw.chars() {
		if matches!(ch, '\\' | '%' | '_') {
			out.push('\\');
		}

		out.push(ch);
	}

	out
}
