//! Authorization decisions across the four enforcement modes.

mod common;

use serde_json::json;

use cipher_gate::auth::{AuthMethod, AuthMode, Credential, Verifier};
use cipher_gate::error::GateError;

use common::{now, sign, sign_with, SHARED_SECRET, SIGNING_KEY};

fn verifier(mode: AuthMode) -> Verifier {
    Verifier::new(mode)
        .with_signing_key(SIGNING_KEY)
        .with_shared_secret(SHARED_SECRET)
}

fn cred(raw: &str) -> Credential {
    Credential::parse(raw)
}

// ── open ────────────────────────────────────────────────────────

#[test]
fn test_open_allows_everything() {
    let v = verifier(AuthMode::Open);
    let token = sign(json!({"sub": "a"}));
    for c in [
        Credential::none(),
        cred("garbage"),
        cred("Bearer not.a.token"),
        cred(SHARED_SECRET),
        cred(&format!("Bearer {}", token)),
    ] {
        let d = v.authorize(&c);
        assert!(d.allowed);
        assert_eq!(d.method, AuthMethod::Anonymous);
        assert!(d.claims.is_none());
    }
}

// ── permissive ──────────────────────────────────────────────────

#[test]
fn test_permissive_allows_missing_and_malformed() {
    let v = verifier(AuthMode::Permissive);
    assert!(v.authorize(&Credential::none()).allowed);
    assert!(v.authorize(&cred("Bearer ###")).allowed);
    assert!(v.authorize(&cred("whatever")).allowed);
}

#[test]
fn test_permissive_attaches_claims_from_valid_token() {
    let v = verifier(AuthMode::Permissive);
    let token = sign(json!({"sub": "agent-7"}));
    let d = v.authorize(&cred(&format!("Bearer {}", token)));
    assert!(d.allowed);
    assert_eq!(d.method, AuthMethod::SignedToken);
    assert_eq!(d.subject(), Some("agent-7"));
}

// ── dual ────────────────────────────────────────────────────────

#[test]
fn test_dual_accepts_token_or_secret() {
    let v = verifier(AuthMode::Dual);

    let token = sign(json!({"sub": "svc"}));
    let d = v.authorize(&cred(&format!("Bearer {}", token)));
    assert!(d.allowed);
    assert_eq!(d.method, AuthMethod::SignedToken);

    let d = v.authorize(&cred(SHARED_SECRET));
    assert!(d.allowed);
    assert_eq!(d.method, AuthMethod::SharedSecret);

    let d = v.authorize(&cred(&format!("Bearer {}", SHARED_SECRET)));
    assert!(d.allowed);
    assert_eq!(d.method, AuthMethod::SharedSecret);
}

#[test]
fn test_dual_denies_absent_and_invalid() {
    let v = verifier(AuthMode::Dual);
    for c in [
        Credential::none(),
        cred("wrong-secret"),
        cred("Bearer wrong-secret"),
        cred(&format!("{}x", SHARED_SECRET)),
        cred(&format!("Bearer {}", sign_with(json!({}), "other-key"))),
    ] {
        let d = v.authorize(&c);
        assert!(!d.allowed);
        assert!(d.reason.as_deref().unwrap().starts_with("dual mode"));
    }
}

#[test]
fn test_dual_lowercase_bearer_is_not_stripped() {
    let v = verifier(AuthMode::Dual);
    let d = v.authorize(&cred(&format!("bearer {}", SHARED_SECRET)));
    assert!(!d.allowed);
}

#[test]
fn test_dual_with_only_shared_secret_configured() {
    let v = Verifier::new(AuthMode::Dual).with_shared_secret(SHARED_SECRET);
    assert!(v.authorize(&cred(SHARED_SECRET)).allowed);
    let token = sign(json!({}));
    assert!(!v.authorize(&cred(&format!("Bearer {}", token))).allowed);
}

// ── strict ──────────────────────────────────────────────────────

#[test]
fn test_strict_rejects_shared_secret() {
    let v = verifier(AuthMode::Strict);
    for c in [cred(SHARED_SECRET), cred(&format!("Bearer {}", SHARED_SECRET))] {
        let d = v.authorize(&c);
        assert!(!d.allowed);
        assert_eq!(d.reason.as_deref(), Some("strict mode: signed token required"));
    }
}

#[test]
fn test_strict_accepts_signed_token() {
    let v = verifier(AuthMode::Strict);
    let token = sign(json!({"sub": "ci", "exp": now() + 60}));
    let d = v.authorize(&cred(&format!("Bearer {}", token)));
    assert!(d.allowed);
    assert_eq!(d.actor_name(), "token(ci)");

    // Raw token without the prefix is still a token
    assert!(v.authorize(&cred(&token)).allowed);
}

#[test]
fn test_strict_denial_converts_to_unauthorized() {
    let v = verifier(AuthMode::Strict);
    let err = v.authorize(&Credential::none()).into_result().unwrap_err();
    match err {
        GateError::Unauthorized(msg) => assert!(msg.contains("strict mode")),
        other => panic!("unexpected error: {:?}", other),
    }
}

// ── signed token constraints ────────────────────────────────────

#[test]
fn test_token_signed_with_other_key_denied() {
    let v = verifier(AuthMode::Strict);
    let token = sign_with(json!({"sub": "x"}), "not-the-key");
    assert!(!v.authorize(&cred(&format!("Bearer {}", token))).allowed);
}

#[test]
fn test_issuer_constraint() {
    let v = verifier(AuthMode::Strict).with_issuer("https://issuer.example");

    let good = sign(json!({"iss": "https://issuer.example"}));
    assert!(v.authorize(&cred(&good)).allowed);

    let bad = sign(json!({"iss": "https://evil.example"}));
    assert!(!v.authorize(&cred(&bad)).allowed);

    let missing = sign(json!({}));
    assert!(!v.authorize(&cred(&missing)).allowed);
}

#[test]
fn test_audience_constraint() {
    let v = verifier(AuthMode::Strict).with_audience("cipher-gate");

    assert!(v.authorize(&cred(&sign(json!({"aud": "cipher-gate"})))).allowed);
    assert!(v
        .authorize(&cred(&sign(json!({"aud": ["other", "cipher-gate"]}))))
        .allowed);
    assert!(!v.authorize(&cred(&sign(json!({"aud": "other"})))).allowed);
}

#[test]
fn test_unconstrained_verifier_ignores_iss_and_aud() {
    let v = verifier(AuthMode::Strict);
    let token = sign(json!({"iss": "anyone", "aud": "anything"}));
    assert!(v.authorize(&cred(&token)).allowed);
}

#[test]
fn test_clock_skew_tolerance() {
    let v = verifier(AuthMode::Strict);
    let at = 1_800_000_000;
    let token = sign(json!({"exp": at}));
    assert!(v.authorize_at(&cred(&token), at + 5).allowed);
    assert!(!v.authorize_at(&cred(&token), at + 6).allowed);
}

#[test]
fn test_malformed_tokens_never_panic() {
    let v = verifier(AuthMode::Strict);
    for raw in ["Bearer ", "Bearer a.b", "Bearer ....", "Bearer \u{0}\u{1}", "x.y.z"] {
        assert!(!v.authorize(&cred(raw)).allowed);
    }
}

#[test]
fn test_decision_is_deterministic() {
    let v = verifier(AuthMode::Dual);
    let at = 1_800_000_000;
    let token = sign(json!({"exp": at + 100}));
    for c in [cred(&token), cred(SHARED_SECRET), cred("nope"), Credential::none()] {
        let first = v.authorize_at(&c, at).allowed;
        for _ in 0..5 {
            assert_eq!(v.authorize_at(&c, at).allowed, first);
        }
    }
}
