use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::*;

/// A counting admission gate that limits how many file operations can be in flight at once.
///
/// It also records how many operations are in flight, the highest value that count ever reached and how many admissions were granted.
#[derive(Debug)]
pub struct ConcurrencyGate {
	semaphore: Semaphore,
	ceiling: usize,
	in_flight: AtomicUsize,
	peak: AtomicUsize,
	admitted: AtomicUsize,
}

/// A slot in a [`ConcurrencyGate`]. The slot is released when this is dropped.
#[derive(Debug)]
pub struct GatePermit<'a> {
	gate: &'a ConcurrencyGate,
	_permit: SemaphorePermit<'a>,
}

impl Drop for GatePermit<'_> {
	fn drop(&mut self) {
		self.gate.in_flight.fetch_sub(1, Ordering::SeqCst);
	}
}

impl ConcurrencyGate {
	pub fn new(ceiling: usize) -> Self {
		Self {
			semaphore: Semaphore::new(ceiling),
			ceiling,
			in_flight: AtomicUsize::new(0),
			peak: AtomicUsize::new(0),
			admitted: AtomicUsize::new(0),
		}
	}

	/// Waits until a slot is free.
	pub async fn acquire(&self) -> AppResult<GatePermit<'_>> {
		let permit = self
			.semaphore
			.acquire()
			.await
			.context("The concurrency gate was closed")?;

		let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		self.peak.fetch_max(now, Ordering::SeqCst);
		self.admitted.fetch_add(1, Ordering::SeqCst);

		Ok(GatePermit {
			gate: self,
			_permit: permit,
		})
	}

	pub const fn ceiling(&self) -> usize {
		self.ceiling
	}

	pub fn in_flight(&self) -> usize {
		self.in_flight.load(Ordering::SeqCst)
	}

	/// The highest number of slots that were held at the same time.
	pub fn peak(&self) -> usize {
		self.peak.load(Ordering::SeqCst)
	}

	pub fn admitted(&self) -> usize {
		self.admitted.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod test {
	use std::time::Duration;

	use tokio::task::JoinSet;

	use super::*;

	#[tokio::test]
	async fn never_exceeds_ceiling() -> Result<(), AppError> {
		let gate = Arc::new(ConcurrencyGate::new(3));
		let mut tasks = JoinSet::new();

		for _ in 0..20 {
			let gate = gate.clone();

			tasks.spawn(async move {
				let _permit = gate.acquire().await?;
				assert!(gate.in_flight() <= gate.ceiling());
				tokio::time::sleep(Duration::from_millis(5)).await;
				Ok::<(), AppError>(())
			});
		}

		while let Some(result) = tasks.join_next().await {
			result.context("Task panicked")??;
		}

		assert_eq!(gate.peak(), 3);
		assert_eq!(gate.admitted(), 20);
		assert_eq!(gate.in_flight(), 0);

		Ok(())
	}

	#[tokio::test]
	async fn slot_is_released_on_failure() -> Result<(), AppError> {
		let gate = ConcurrencyGate::new(1);

		let failing = async {
			let _permit = gate.acquire().await?;
			Err::<(), AppError>(AppError::Cancelled)
		};

		assert!(failing.await.is_err());
		assert_eq!(gate.in_flight(), 0);

		// Would wait forever if the slot had leaked
		let _permit = gate.acquire().await?;
		assert_eq!(gate.in_flight(), 1);

		Ok(())
	}
}
