//! Decorative "blockchain" certification.
//!
//! The digest is real (SHA-256 over the JSON form of the record); the
//! anchoring is not. `SimulatedLedger` only waits and invents a block
//! number, and its receipts say so.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::{
    context::AppContext,
    error::Result,
    models::{
        certificate::{BlockReceipt, CertificateChain, CertificateData, Certification, CERTIFICATE_NETWORK},
        person::Person,
        relation::FamilyRelation,
    },
    services::relations::RelationService,
};

/// Lowercase hex SHA-256 of the serialized value.
pub fn generate_hash<T: Serialize>(data: &T) -> Result<String> {
    let bytes = serde_json::to_vec(data)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Somewhere a digest can be anchored.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn anchor(&self, hash: &str) -> Result<BlockReceipt>;
}

pub struct SimulatedLedger {
    delay: Duration,
}

impl SimulatedLedger {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Ledger for SimulatedLedger {
    async fn anchor(&self, hash: &str) -> Result<BlockReceipt> {
        tokio::time::sleep(self.delay).await;
        let block_number = rand::thread_rng().gen_range(0..1_000_000);
        info!(hash = %hash, block = block_number, "Simulated anchoring done");
        Ok(BlockReceipt { block_number, timestamp: Utc::now(), validated: true, simulated: true })
    }
}

pub fn certificate_data(person: &Person, relations: &[FamilyRelation]) -> CertificateData {
    let now = Utc::now();
    CertificateData {
        person: person.clone(),
        relations: relations.to_vec(),
        timestamp: now,
        certificate_id: format!("CERT-{}", now.timestamp_millis()),
        blockchain: CertificateChain {
            network: CERTIFICATE_NETWORK.to_string(),
            status: "Validated".to_string(),
        },
    }
}

/// Hash the person with their relations and anchor the digest. Nothing
/// is persisted.
pub async fn certify(
    ctx: &AppContext,
    ledger: &dyn Ledger,
    person: &Person,
) -> Result<Certification> {
    let relations = RelationService::list_for_person(ctx, person.id).await?;
    let data = certificate_data(person, &relations);
    let hash = generate_hash(&data)?;
    let receipt = ledger.anchor(&hash).await?;
    Ok(Certification { hash, receipt, data })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::models::person::NewPerson;
    use crate::services::people::{tests::signed_in_context, PeopleService};

    #[test]
    fn test_hash_is_deterministic() {
        let data = json!({ "first_name": "Jeanne", "name": "Martin", "birth_date": "1850-06-15" });
        let a = generate_hash(&data).unwrap();
        let b = generate_hash(&data.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let other = generate_hash(&json!({ "first_name": "Jeanne", "name": "Martin" })).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            generate_hash(&"abc").unwrap(),
            hex::encode(Sha256::digest(b"\"abc\""))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_ledger_waits_and_flags_receipt() {
        let ledger = SimulatedLedger::new(Duration::from_millis(2000));
        let start = Instant::now();
        let receipt = ledger.anchor("deadbeef").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(2000));
        assert!(receipt.block_number < 1_000_000);
        assert!(receipt.validated);
        assert!(receipt.simulated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_certify_hashes_certificate_without_persisting() {
        let (ctx, backend) = signed_in_context("cert@example.org").await;
        let person = PeopleService::create(&ctx, NewPerson::new("Jeanne", "Martin").unwrap(), false)
            .await
            .unwrap();
        let writes_before = backend.rows(crate::backend::PEOPLE);

        let ledger = SimulatedLedger::new(Duration::from_millis(10));
        let cert = certify(&ctx, &ledger, &person).await.unwrap();

        assert_eq!(cert.hash, generate_hash(&cert.data).unwrap());
        assert!(cert.data.certificate_id.starts_with("CERT-"));
        assert_eq!(cert.data.blockchain.network, CERTIFICATE_NETWORK);
        assert_eq!(cert.data.blockchain.status, "Validated");
        assert_eq!(backend.rows(crate::backend::PEOPLE), writes_before);
    }
}
