#![cfg(feature = "test")]

// std
use std::time::Duration as StdDuration;
// self
use aggregator_link::{
	_preludet::*,
	error::TransportError,
	transport::{MemoryTransport, RemoteCall},
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquisitions_share_one_anonymous_user() {
	let (link, transport) = build_test_link();
	let scope = test_scope();

	transport.set_latency(RemoteCall::CreateAnonymousUser, StdDuration::from_millis(50));

	let handles = (0..16)
		.map(|_| {
			let tokens = link.tokens().clone();
			let scope = scope.clone();

			tokio::spawn(async move { tokens.acquire(&scope).await })
		})
		.collect::<Vec<_>>();
	let mut tokens = Vec::new();

	for handle in handles {
		tokens.push(
			handle
				.await
				.expect("Acquisition task should not panic.")
				.expect("Acquisition should succeed."),
		);
	}

	assert!(tokens.windows(2).all(|pair| pair[0] == pair[1]));
	assert_eq!(transport.calls(RemoteCall::CreateAnonymousUser), 1);
	assert!(!link.tokens().is_acquiring(&scope));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_reach_every_caller() {
	let (link, transport) = build_test_link();
	let scope = test_scope();

	transport.set_latency(RemoteCall::CreateAnonymousUser, StdDuration::from_millis(50));
	transport.fail_next(RemoteCall::CreateAnonymousUser, TransportError::Timeout);

	let (first, second) =
		tokio::join!(link.tokens().acquire(&scope), link.tokens().acquire(&scope));

	assert!(matches!(first, Err(Error::Transport(TransportError::Timeout))));
	assert!(matches!(second, Err(Error::Transport(TransportError::Timeout))));
	assert_eq!(transport.calls(RemoteCall::CreateAnonymousUser), 1);

	link.tokens().acquire(&scope).await.expect("A later acquisition should start fresh.");

	assert_eq!(transport.calls(RemoteCall::CreateAnonymousUser), 2);
}

#[tokio::test]
async fn store_calls_reauthenticate_once_per_rejection() {
	let (link, transport) = build_test_link();

	link.credentials().list_all().await.expect("Initial listing should succeed.");
	transport.revoke_tokens();
	link.credentials().list_all().await.expect("Listing should recover with a fresh token.");

	assert_eq!(transport.calls(RemoteCall::CreateAnonymousUser), 2);
	assert_eq!(transport.calls(RemoteCall::ListCredentials), 3);
}

#[tokio::test]
async fn persistent_rejection_is_bounded() {
	let (link, transport) = build_test_link();

	for _ in 0..3 {
		transport.fail_next(
			RemoteCall::ListCredentials,
			Error::AuthenticationRejected { reason: "token revoked".into() },
		);
	}

	let err = link
		.credentials()
		.list_all()
		.await
		.expect_err("Rejections beyond the retry bound must surface.");

	assert!(err.is_authentication_rejected());
	assert_eq!(transport.calls(RemoteCall::ListCredentials), 2);
	assert_eq!(transport.calls(RemoteCall::CreateAnonymousUser), 2);
}
