use crate::value::SqlValue;

/// One typed constraint on a field or related collection.
#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
	Eq(SqlValue),
	/// Inclusive bounds; either side may be open.
	Range {
		min: Option<SqlValue>,
		max: Option<SqlValue>,
	},
	In(Vec<SqlValue>),
	/// Raw substring; wildcards are added by the builder.
	Contains(String),
	/// At least one related row satisfies the nested set.
	Exists(PredicateSet),
}
impl Constraint {
	pub fn operator(&self) -> &'static str {
		match self {
			Self::Eq(_) => "eq",
			Self::Range { .. } => "range",
			Self::In(_) => "in",
			Self::Contains(_) => "contains",
			Self::Exists(_) => "exists",
		}
	}
}

/// Sparse filter for one aggregate, kept in insertion order.
///
/// Setting a field twice replaces the earlier constraint in place, so fragment order always
/// follows the first time a field was mentioned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PredicateSet {
	entries: Vec<(String, Constraint)>,
}
impl PredicateSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn get(&self, field: &str) -> Option<&Constraint> {
		self.entries.iter().find(|(name, _)| name == field).map(|(_, constraint)| constraint)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Constraint)> {
		self.entries.iter().map(|(name, constraint)| (name.as_str(), constraint))
	}

	pub fn insert(&mut self, field: impl Into<String>, constraint: Constraint) -> &mut Self {
		let field = field.into();

		match self.entries.iter_mut().find(|(name, _)| *name == field) {
			Some(entry) => entry.1 = constraint,
			None => self.entries.push((field, constraint)),
		}

		self
	}

	pub fn with(mut self, field: impl Into<String>, constraint: Constraint) -> Self {
		self.insert(field, constraint);

		self
	}

	pub fn eq(self, field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
		self.with(field, Constraint::Eq(value.into()))
	}

	pub fn one_of<I, V>(self, field: impl Into<String>, values: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<SqlValue>,
	{
		self.with(field, Constraint::In(values.into_iter().map(Into::into).collect()))
	}

	pub fn contains(self, field: impl Into<String>, needle: impl Into<String>) -> Self {
		self.with(field, Constraint::Contains(needle.into()))
	}

	pub fn exists(self, related: impl Into<String>, nested: PredicateSet) -> Self {
		self.with(related, Constraint::Exists(nested))
	}

	/// Sets the lower bound, keeping an upper bound already present for the field.
	pub fn at_least(mut self, field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
		self.merge_bound(field.into(), Some(value.into()), None);

		self
	}

	/// Sets the upper bound, keeping a lower bound already present for the field.
	pub fn at_most(mut self, field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
		self.merge_bound(field.into(), None, Some(value.into()));

		self
	}

	fn merge_bound(&mut self, field: String, min: Option<SqlValue>, max: Option<SqlValue>) {
		let (prev_min, prev_max) = match self.get(&field) {
			Some(Constraint::Range { min, max }) => (min.clone(), max.clone()),
			_ => (None, None),
		};

		self.insert(field, Constraint::Range { min: min.or(prev_min), max: max.or(prev_max) });
	}
}
