use std::{future::Future, time::Duration};

use tokio::time::{self, Instant};

use crate::{Error, Result};

/// Caller-supplied bound on a request's I/O. The default never expires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Deadline {
	at: Option<Instant>,
}
impl Deadline {
	pub fn none() -> Self {
		Self::default()
	}

	pub fn at(at: Instant) -> Self {
		Self { at: Some(at) }
	}

	pub fn after(timeout: Duration) -> Self {
		Self::at(Instant::now() + timeout)
	}

	/// Zero disables the deadline.
	pub fn from_timeout_ms(timeout_ms: u64) -> Self {
		if timeout_ms == 0 { Self::none() } else { Self::after(Duration::from_millis(timeout_ms)) }
	}

	pub fn is_expired(&self) -> bool {
		self.at.is_some_and(|at| at <= Instant::now())
	}

	/// Awaits `fut`, failing with [`Error::DeadlineExceeded`] once the deadline passes.
	pub async fn run<T, F>(self, operation: &'static str, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		match self.at {
			None => fut.await,
			Some(at) => time::timeout_at(at, fut)
				.await
				.map_err(|_| Error::DeadlineExceeded { operation })?,
		}
	}
}
