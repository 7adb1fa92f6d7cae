//! Per-key request coalescing shared by the token coordinator and both stores.

// self
use crate::_prelude::*;

type Flight<T> = Arc<OnceCell<Result<T>>>;

/// Joins concurrent calls for the same key onto one underlying future.
///
/// The first caller for a key runs the call; everyone who arrives before it settles receives a
/// clone of the same result, failures included. The flight is forgotten once it settles, so a
/// later call starts fresh. If the running caller is dropped mid-call, one of the waiters takes
/// over and runs the call again.
pub(crate) struct Singleflight<K, T> {
	flights: Mutex<HashMap<K, Flight<T>>>,
}
impl<K, T> Singleflight<K, T>
where
	K: Clone + Eq + Hash,
	T: Clone,
{
	pub(crate) async fn run<F, Fut>(&self, key: K, call: F) -> Result<T>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let flight = self
			.flights
			.lock()
			.entry(key.clone())
			.or_insert_with(|| Arc::new(OnceCell::new()))
			.clone();
		let result = flight.get_or_init(call).await.clone();
		let mut flights = self.flights.lock();

		if flights.get(&key).is_some_and(|current| Arc::ptr_eq(current, &flight)) {
			flights.remove(&key);
		}

		result
	}

	pub(crate) fn in_flight(&self, key: &K) -> bool {
		self.flights.lock().contains_key(key)
	}
}
impl<K, T> Default for Singleflight<K, T> {
	fn default() -> Self {
		Self { flights: Mutex::new(HashMap::new()) }
	}
}
impl<K, T> Debug for Singleflight<K, T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Singleflight").field("in_flight", &self.flights.lock().len()).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::error::TransportError;

	#[tokio::test]
	async fn concurrent_callers_share_one_call() {
		let flights = Singleflight::<&str, u32>::default();
		let calls = AtomicUsize::new(0);
		let calls = &calls;
		let call = move || async move {
			calls.fetch_add(1, Ordering::SeqCst);
			tokio::task::yield_now().await;

			Ok::<_, Error>(7)
		};
		let (a, b, c) = tokio::join!(
			flights.run("key", call),
			flights.run("key", call),
			flights.run("key", call)
		);

		assert_eq!((a.ok(), b.ok(), c.ok()), (Some(7), Some(7), Some(7)));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(!flights.in_flight(&"key"));
	}

	#[tokio::test]
	async fn failures_reach_every_waiter_and_are_not_kept() {
		let flights = Singleflight::<u8, u32>::default();
		let calls = AtomicUsize::new(0);
		let calls = &calls;
		let failing = move || async move {
			calls.fetch_add(1, Ordering::SeqCst);
			tokio::task::yield_now().await;

			Err::<u32, _>(Error::from(TransportError::Timeout))
		};
		let (a, b) = tokio::join!(flights.run(1, failing), flights.run(1, failing));

		assert!(matches!(a, Err(Error::Transport(TransportError::Timeout))));
		assert!(matches!(b, Err(Error::Transport(TransportError::Timeout))));
		assert_eq!(calls.load(Ordering::SeqCst), 1);

		let retried = flights.run(1, || async { Ok(3) }).await;

		assert_eq!(retried.ok(), Some(3));
	}

	#[tokio::test]
	async fn distinct_keys_do_not_coalesce() {
		let flights = Singleflight::<u8, u8>::default();
		let (a, b) =
			tokio::join!(flights.run(1, || async { Ok(1) }), flights.run(2, || async { Ok(2) }));

		assert_eq!((a.ok(), b.ok()), (Some(1), Some(2)));
	}
}
