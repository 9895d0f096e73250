use std::cmp::Ordering;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::FieldKind;

/// A value bound to a positional parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
	Text(String),
	Int(i64),
	Float(f64),
	Bool(bool),
	Timestamp(OffsetDateTime),
	Uuid(Uuid),
}
impl SqlValue {
	pub fn kind_label(&self) -> &'static str {
		match self {
			Self::Text(_) => "text",
			Self::Int(_) => "integer",
			Self::Float(_) => "float",
			Self::Bool(_) => "boolean",
			Self::Timestamp(_) => "timestamp",
			Self::Uuid(_) => "uuid",
		}
	}

	/// Converts the value to the column kind, widening integers to floats.
	pub(crate) fn coerce(&self, kind: FieldKind) -> Option<Self> {
		match (kind, self) {
			(FieldKind::Text, Self::Text(_))
			| (FieldKind::Int, Self::Int(_))
			| (FieldKind::Float, Self::Float(_))
			| (FieldKind::Bool, Self::Bool(_))
			| (FieldKind::Timestamp, Self::Timestamp(_))
			| (FieldKind::Uuid, Self::Uuid(_)) => Some(self.clone()),
			(FieldKind::Float, Self::Int(value)) => Some(Self::Float(*value as f64)),
			_ => None,
		}
	}

	/// Orders two values of the same kind. Mixed kinds are incomparable.
	pub(crate) fn compare(&self, other: &Self) -> Option<Ordering> {
		match (self, other) {
			(Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
			(Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
			(Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
			(Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
			_ => None,
		}
	}
}

impl From<&str> for SqlValue {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}

impl From<String> for SqlValue {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}

impl From<i64> for SqlValue {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<i32> for SqlValue {
	fn from(value: i32) -> Self {
		Self::Int(value.into())
	}
}

impl From<f64> for SqlValue {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

impl From<bool> for SqlValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<OffsetDateTime> for SqlValue {
	fn from(value: OffsetDateTime) -> Self {
		Self::Timestamp(value)
	}
}

impl From<Uuid> for SqlValue {
	fn from(value: Uuid) -> Self {
		Self::Uuid(value)
	}
}

/// An argument slot: one placeholder, one or many bound values.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum SqlArg {
	Scalar(SqlValue),
	List(Vec<SqlValue>),
}
impl SqlArg {
	pub(crate) fn values(&self) -> impl Iterator<Item = &SqlValue> {
		let slice: &[SqlValue] = match self {
			Self::Scalar(value) => std::slice::from_ref(value),
			Self::List(values) => values.as_slice(),
		};

		slice.iter()
	}
}
