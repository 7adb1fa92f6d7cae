//! Change-notification registry with drop-to-unsubscribe tokens.

// std
use std::sync::Weak;
// self
use crate::_prelude::*;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Observers<T>
where
	T: ?Sized,
{
	next_id: u64,
	callbacks: BTreeMap<u64, Callback<T>>,
}

/// Ordered list of observers notified after every store mutation.
pub struct ObserverRegistry<T>
where
	T: ?Sized,
{
	inner: Arc<Mutex<Observers<T>>>,
}
impl<T> ObserverRegistry<T>
where
	T: 'static + ?Sized,
{
	/// Registers `callback`; it stays registered until the returned [`Subscription`] drops.
	pub fn subscribe(&self, callback: impl 'static + Fn(&T) + Send + Sync) -> Subscription {
		let id = {
			let mut observers = self.inner.lock();
			let id = observers.next_id;

			observers.next_id += 1;
			observers.callbacks.insert(id, Arc::new(callback));

			id
		};
		let registry = Arc::downgrade(&self.inner);

		Subscription::new(move || Self::release(registry, id))
	}

	/// Calls every observer in subscription order.
	///
	/// Callbacks run outside the registry lock, so an observer may subscribe or drop its own
	/// subscription while being notified.
	pub fn notify(&self, value: &T) {
		let callbacks = self.inner.lock().callbacks.values().cloned().collect::<Vec<_>>();

		for callback in callbacks {
			callback(value);
		}
	}

	/// Number of live subscriptions.
	pub fn len(&self) -> usize {
		self.inner.lock().callbacks.len()
	}

	/// Returns `true` when nobody is subscribed.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn release(registry: Weak<Mutex<Observers<T>>>, id: u64) {
		if let Some(registry) = registry.upgrade() {
			registry.lock().callbacks.remove(&id);
		}
	}
}
impl<T> Default for ObserverRegistry<T>
where
	T: ?Sized,
{
	fn default() -> Self {
		Self { inner: Arc::new(Mutex::new(Observers { next_id: 0, callbacks: BTreeMap::new() })) }
	}
}
impl<T> Debug for ObserverRegistry<T>
where
	T: ?Sized,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ObserverRegistry")
			.field("subscriptions", &self.inner.lock().callbacks.len())
			.finish()
	}
}

/// Token keeping an observer registered; dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
	release: Option<Box<dyn FnOnce() + Send + Sync>>,
}
impl Subscription {
	fn new(release: impl 'static + FnOnce() + Send + Sync) -> Self {
		Self { release: Some(Box::new(release)) }
	}

	/// Unsubscribes now; equivalent to dropping the token.
	pub fn cancel(self) {}
}
impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(release) = self.release.take() {
			release();
		}
	}
}
impl Debug for Subscription {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Subscription(..)")
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	#[test]
	fn dropping_the_token_unsubscribes() {
		let registry = ObserverRegistry::<[u32]>::default();
		let seen = Arc::new(AtomicUsize::new(0));
		let counter = seen.clone();
		let subscription = registry.subscribe(move |values| {
			counter.fetch_add(values.len(), Ordering::SeqCst);
		});

		registry.notify(&[1, 2, 3]);

		assert_eq!(seen.load(Ordering::SeqCst), 3);
		assert_eq!(registry.len(), 1);

		drop(subscription);
		registry.notify(&[4]);

		assert_eq!(seen.load(Ordering::SeqCst), 3);
		assert!(registry.is_empty());
	}

	#[test]
	fn observers_run_in_subscription_order() {
		let registry = ObserverRegistry::<str>::default();
		let log = Arc::new(Mutex::new(Vec::new()));
		let first_log = log.clone();
		let second_log = log.clone();
		let _first = registry.subscribe(move |value| first_log.lock().push(format!("a:{value}")));
		let _second = registry.subscribe(move |value| second_log.lock().push(format!("b:{value}")));

		registry.notify("x");

		assert_eq!(*log.lock(), vec!["a:x".to_owned(), "b:x".to_owned()]);
	}

	#[test]
	fn tokens_outliving_the_registry_are_harmless() {
		let registry = ObserverRegistry::<u8>::default();
		let subscription = registry.subscribe(|_| {});

		drop(registry);
		subscription.cancel();
	}
}
