use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{person::Person, relation::FamilyRelation};

pub const CERTIFICATE_NETWORK: &str = "Genealogy Testnet";

/// Receipt from a ledger. With the simulated ledger none of this is
/// verifiable; `simulated` says so.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BlockReceipt {
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    pub validated: bool,
    pub simulated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificateChain {
    pub network: String,
    pub status: String,
}

/// Presentation-only certificate payload.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateData {
    pub person: Person,
    pub relations: Vec<FamilyRelation>,
    pub timestamp: DateTime<Utc>,
    pub certificate_id: String,
    pub blockchain: CertificateChain,
}

/// Digest plus receipt, as shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct Certification {
    pub hash: String,
    pub receipt: BlockReceipt,
    pub data: CertificateData,
}
