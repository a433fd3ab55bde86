use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use substack_relay_core::cache::ClientCache;
use substack_relay_core::credentials::{CredentialError, Credentials};

#[derive(Debug)]
struct FakeClient {
    serial: usize,
}

fn credentials(key: &str) -> Credentials {
    Credentials::new("writer.substack.com", key)
}

#[test]
fn test_cache_reuses_client_for_same_credentials() {
    let cache: ClientCache<FakeClient> = ClientCache::new();
    let built = AtomicUsize::new(0);
    let factory = |_: &Credentials| -> Result<FakeClient, CredentialError> {
        Ok(FakeClient {
            serial: built.fetch_add(1, Ordering::SeqCst),
        })
    };

    let first = cache
        .get_or_try_insert_with(&credentials("sid-1"), factory)
        .expect("factory succeeds");
    let second = cache
        .get_or_try_insert_with(&credentials("sid-1"), factory)
        .expect("cached");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_cache_separates_credential_sets() {
    let cache: ClientCache<FakeClient> = ClientCache::new();
    let a = cache
        .get_or_try_insert_with(&credentials("sid-a"), |_| {
            Ok::<_, CredentialError>(FakeClient { serial: 1 })
        })
        .expect("built");
    let b = cache
        .get_or_try_insert_with(&credentials("sid-b"), |_| {
            Ok::<_, CredentialError>(FakeClient { serial: 2 })
        })
        .expect("built");

    assert_eq!((a.serial, b.serial), (1, 2));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_cache_key_normalises_address_and_hides_secret() {
    let plain = ClientCache::<FakeClient>::cache_key(&Credentials::new(
        "Writer.Substack.com/",
        "secret-sid",
    ));
    let with_scheme = ClientCache::<FakeClient>::cache_key(&Credentials::new(
        "https://writer.substack.com",
        "secret-sid",
    ));
    assert_eq!(plain, with_scheme);
    assert_eq!(plain.len(), 64);
    assert!(!plain.contains("secret-sid"));
}

#[test]
fn test_failed_factory_caches_nothing() {
    let cache: ClientCache<FakeClient> = ClientCache::new();
    let result = cache.get_or_try_insert_with(&credentials("sid"), |_| {
        Err::<FakeClient, _>(CredentialError::MissingApiKey)
    });
    assert_eq!(result.err(), Some(CredentialError::MissingApiKey));
    assert!(cache.is_empty());
}

#[test]
fn test_invalidate_and_clear() {
    let cache: ClientCache<FakeClient> = ClientCache::new();
    let creds = credentials("sid");
    cache
        .get_or_try_insert_with(&creds, |_| Ok::<_, CredentialError>(FakeClient { serial: 0 }))
        .expect("built");

    assert!(cache.get(&creds).is_some());
    assert!(cache.invalidate(&creds));
    assert!(!cache.invalidate(&creds));
    assert!(cache.get(&creds).is_none());

    cache
        .get_or_try_insert_with(&creds, |_| Ok::<_, CredentialError>(FakeClient { serial: 1 }))
        .expect("rebuilt");
    cache.clear();
    assert!(cache.is_empty());
}
