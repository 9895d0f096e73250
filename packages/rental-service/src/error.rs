pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Invalid query: {0}")]
	Composition(#[from] rental_query::Error),
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Cache error: {message}")]
	Cache { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
	#[error("Deadline exceeded during {operation}.")]
	DeadlineExceeded { operation: &'static str },
}
impl Error {
	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}

	pub(crate) fn not_found(kind: &str, id: uuid::Uuid) -> Self {
		Self::NotFound { message: format!("{kind} {id}") }
	}
}

impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<rental_storage::Error> for Error {
	fn from(err: rental_storage::Error) -> Self {
		match err {
			rental_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			rental_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			rental_storage::Error::NotFound(message) => Self::NotFound { message },
			rental_storage::Error::Qdrant(inner) => Self::Index { message: inner.to_string() },
		}
	}
}
