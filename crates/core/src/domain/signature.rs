use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::contract::ContractId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureRequestId(pub String);

impl SignatureRequestId {
    pub fn generate() -> Self {
        Self(format!("es-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureProvider {
    DocuSign,
    Adobe,
    Viettel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    Pending,
    Completed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    pub email: String,
    pub name: String,
    pub role: String,
    pub signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ESignatureRequest {
    pub id: SignatureRequestId,
    pub contract_id: ContractId,
    pub signers: Vec<Signer>,
    pub provider: SignatureProvider,
    pub status: SignatureStatus,
    pub created_at: DateTime<Utc>,
}

impl ESignatureRequest {
    pub fn all_signed(&self) -> bool {
        !self.signers.is_empty() && self.signers.iter().all(|signer| signer.signed)
    }
}
