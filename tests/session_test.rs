//! Session registry lifecycle and concurrency.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use cipher_gate::error::GateError;
use cipher_gate::session::{SessionId, SessionRegistry};
use cipher_gate::types::{Duration, Utc};

#[test]
fn test_sequential_ids_are_distinct() {
    let registry = SessionRegistry::new();
    let ids: HashSet<SessionId> = (0..1000).map(|_| registry.create()).collect();
    assert_eq!(ids.len(), 1000);
    assert_eq!(registry.len(), 1000);
}

#[test]
fn test_concurrent_creates_never_collide() {
    let registry = Arc::new(SessionRegistry::new());
    let handles: Vec<_> = (0..100)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || registry.create())
        })
        .collect();

    let ids: HashSet<SessionId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(ids.len(), 100);
    assert_eq!(registry.len(), 100);
}

#[test]
fn test_lookup_after_remove_is_not_found_permanently() {
    let registry = SessionRegistry::new();
    let id = registry.create();
    assert!(registry.lookup(id.as_str()).is_ok());

    assert!(registry.remove(id.as_str()));
    for _ in 0..3 {
        match registry.lookup(id.as_str()) {
            Err(GateError::SessionNotFound(missing)) => assert_eq!(missing, id.as_str()),
            other => panic!("expected not found, got {:?}", other.map(|s| s.id().clone())),
        }
    }

    // New sessions never reuse the removed id
    for _ in 0..100 {
        assert_ne!(registry.create(), id);
    }
}

#[test]
fn test_remove_is_idempotent() {
    let registry = SessionRegistry::new();
    let id = registry.create();
    assert!(registry.remove(id.as_str()));
    assert!(!registry.remove(id.as_str()));
    assert!(!registry.remove("never-existed"));
    assert!(registry.is_empty());
}

#[test]
fn test_lookup_does_not_mutate() {
    let registry = SessionRegistry::new();
    let id = registry.create();
    let before = registry.lookup(id.as_str()).unwrap().last_active_at();
    let _ = registry.lookup(id.as_str()).unwrap();
    assert_eq!(registry.lookup(id.as_str()).unwrap().last_active_at(), before);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_unknown_id_not_found() {
    let registry = SessionRegistry::new();
    assert!(matches!(
        registry.lookup("deadbeef"),
        Err(GateError::SessionNotFound(_))
    ));
}

#[test]
fn test_idle_sessions_expire_and_are_swept() {
    let registry = SessionRegistry::with_idle_timeout(Some(Duration::minutes(5)));
    let id = registry.create();
    let later = Utc::now() + Duration::minutes(10);

    assert!(registry.lookup_at(id.as_str(), Utc::now()).is_ok());
    assert!(registry.lookup_at(id.as_str(), later).is_err());
    // Read-only: still registered until swept
    assert_eq!(registry.len(), 1);

    assert_eq!(registry.sweep_expired_at(later), 1);
    assert!(registry.is_empty());
    assert!(registry.lookup(id.as_str()).is_err());
}

#[test]
fn test_touch_keeps_session_alive() {
    let registry = SessionRegistry::with_idle_timeout(Some(Duration::minutes(5)));
    let id = registry.create();
    let handle = registry.lookup(id.as_str()).unwrap();
    handle.touch();
    assert!(handle.last_active_at() >= handle.created_at());
    assert_eq!(registry.sweep_expired_at(Utc::now() + Duration::minutes(1)), 0);
}

#[test]
fn test_no_idle_timeout_never_sweeps() {
    let registry = SessionRegistry::new();
    registry.create();
    assert_eq!(registry.sweep_expired_at(Utc::now() + Duration::days(365)), 0);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_close_all_closes_handles() {
    let registry = SessionRegistry::new();
    let a = registry.lookup(registry.create().as_str()).unwrap();
    let b = registry.lookup(registry.create().as_str()).unwrap();
    assert_eq!(registry.close_all(), 2);
    assert!(a.is_closed() && b.is_closed());
    assert!(registry.lookup(a.id().as_str()).is_err());
}

#[test]
fn test_parallel_create_lookup_remove() {
    let registry = Arc::new(SessionRegistry::new());
    thread::scope(|scope| {
        for _ in 0..8 {
            let registry = registry.clone();
            scope.spawn(move || {
                for _ in 0..200 {
                    let id = registry.create();
                    assert!(registry.lookup(id.as_str()).is_ok());
                    assert!(registry.remove(id.as_str()));
                    assert!(registry.lookup(id.as_str()).is_err());
                }
            });
        }
    });
    assert!(registry.is_empty());
}

#[test]
fn test_enter_serialises_calls_within_a_session() {
    let registry = SessionRegistry::new();
    let handle = registry.lookup(registry.create().as_str()).unwrap();
    let active = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let _guard = handle.enter();
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::yield_now();
                    active.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
    });
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[test]
fn test_create_handle_is_live_even_with_zero_idle_timeout() {
    let registry = SessionRegistry::with_idle_timeout(Some(Duration::zero()));
    let handle = registry.create_handle();
    assert!(!handle.is_closed());
    assert_eq!(registry.len(), 1);

    // Expiry still applies to later lookups and sweeps
    let later = Utc::now() + Duration::seconds(1);
    assert!(registry.lookup_at(handle.id().as_str(), later).is_err());
    assert_eq!(registry.sweep_expired_at(later), 1);
    assert!(handle.is_closed());
}
