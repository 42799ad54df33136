//! Scenario: a webhook-shaped caller must present a valid HMAC-SHA256
//! signature before its event reaches the engine at all. The HTTP surface
//! and real header parsing are out of scope here; this is a test-local
//! verifier gating calls into `EngineFacade::enqueue`.

use crate::prelude::*;
use ductile_core::JobId;
use ductile_engine::{EnqueueRequest, EngineFacade};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn verify(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

struct FakeWebhookGateway {
    secret: String,
}

impl FakeWebhookGateway {
    fn new(secret: &str) -> Self {
        Self { secret: secret.to_string() }
    }

    /// Mirrors the contract a real webhook handler enforces: verify the
    /// signature over the raw body before ever touching the engine.
    async fn deliver(&self, engine: &impl EngineFacade, body: &[u8], signature_hex: &str) -> Option<JobId> {
        if !verify(&self.secret, body, signature_hex) {
            return None;
        }
        let payload: serde_json::Value = serde_json::from_slice(body).ok()?;
        engine
            .enqueue(EnqueueRequest {
                plugin: "echo".to_string(),
                command: "handle".to_string(),
                payload,
                dedupe_key: None,
                max_attempts: None,
                submitted_by: "webhook:/hooks/echo".to_string(),
            })
            .await
            .ok()
    }
}

#[tokio::test]
async fn a_correctly_signed_delivery_reaches_the_engine() {
    let plugin_dir = tempfile::tempdir().unwrap();
    let registry = script_plugin(plugin_dir.path(), "echo", OK_RESPONSE);
    let harness = TestEngine::build(registry, Vec::new(), TestTuning::fast());

    let gateway = FakeWebhookGateway::new("top-secret");
    let body = br#"{"from":"upstream"}"#;
    let signature = sign("top-secret", body);

    let job_id = gateway.deliver(&harness.engine, body, &signature).await;
    assert!(job_id.is_some(), "a correctly signed delivery must be accepted");

    let job = harness.engine.get_job(job_id.as_ref().unwrap()).await.unwrap().expect("job exists");
    assert_eq!(job.submitted_by, "webhook:/hooks/echo");
}

#[tokio::test]
async fn a_tampered_body_is_rejected_before_it_reaches_the_engine() {
    let plugin_dir = tempfile::tempdir().unwrap();
    let registry = script_plugin(plugin_dir.path(), "echo", OK_RESPONSE);
    let harness = TestEngine::build(registry, Vec::new(), TestTuning::fast());

    let gateway = FakeWebhookGateway::new("top-secret");
    let original_body = br#"{"from":"upstream"}"#;
    let signature = sign("top-secret", original_body);

    let tampered_body = br#"{"from":"attacker"}"#;
    let job_id = gateway.deliver(&harness.engine, tampered_body, &signature).await;
    assert!(job_id.is_none(), "a signature computed over a different body must not validate");

    let queued = harness.engine.list_jobs(Default::default()).await.unwrap();
    assert!(queued.is_empty(), "a rejected delivery must never reach the work queue");
}

#[tokio::test]
async fn an_unknown_secret_is_rejected() {
    let plugin_dir = tempfile::tempdir().unwrap();
    let registry = script_plugin(plugin_dir.path(), "echo", OK_RESPONSE);
    let harness = TestEngine::build(registry, Vec::new(), TestTuning::fast());

    let gateway = FakeWebhookGateway::new("top-secret");
    let body = br#"{"from":"upstream"}"#;
    let wrong_signature = sign("wrong-secret", body);

    let job_id = gateway.deliver(&harness.engine, body, &wrong_signature).await;
    assert!(job_id.is_none());
}

#[test]
fn signature_is_sixty_four_hex_characters_for_sha256() {
    let signature = sign("any-secret", b"any body");
    assert_eq!(signature.len(), 64);
}
