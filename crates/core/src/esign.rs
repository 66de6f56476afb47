use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::contract::{Contract, ContractStatus};
use crate::domain::signature::{
    ESignatureRequest, SignatureProvider, SignatureRequestId, SignatureStatus, Signer,
};
use crate::domain::user::{Permission, User};
use crate::domain::version::{ChangeType, NewVersion};
use crate::errors::{AuthorizationFailure, InvalidStateFailure, ValidationFailure, WorkflowError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerInput {
    pub email: String,
    pub name: String,
    pub role: String,
}

impl SignerInput {
    fn is_complete(&self) -> bool {
        [&self.email, &self.name, &self.role].iter().all(|field| !field.trim().is_empty())
    }
}

impl Contract {
    pub fn active_signature_request(&self) -> Option<&ESignatureRequest> {
        self.e_signature.as_ref().filter(|request| request.status == SignatureStatus::Pending)
    }

    /// Opens a signature request for an approved contract. Incomplete signer rows are dropped.
    pub fn send_for_signature(
        &mut self,
        signers: Vec<SignerInput>,
        provider: SignatureProvider,
        sender: &User,
        now: DateTime<Utc>,
    ) -> Result<&ESignatureRequest, WorkflowError> {
        if !sender.is_active {
            return Err(AuthorizationFailure::InactiveUser { user_id: sender.id.0.clone() }.into());
        }
        if !sender.can(Permission::Sign) {
            return Err(AuthorizationFailure::MissingPermission {
                user_id: sender.id.0.clone(),
                permission: Permission::Sign,
            }
            .into());
        }
        if self.status != ContractStatus::Approved {
            return Err(InvalidStateFailure::NotApproved { status: self.status }.into());
        }
        if self.active_signature_request().is_some() {
            return Err(InvalidStateFailure::SignatureRequestActive.into());
        }

        let signers: Vec<Signer> = signers
            .into_iter()
            .filter(SignerInput::is_complete)
            .map(|input| Signer {
                email: input.email.trim().to_ascii_lowercase(),
                name: input.name.trim().to_string(),
                role: input.role.trim().to_string(),
                signed: false,
                signed_at: None,
            })
            .collect();
        if signers.is_empty() {
            return Err(ValidationFailure::NoSigners.into());
        }

        self.touch(&sender.name, now);
        Ok(self.e_signature.insert(ESignatureRequest {
            id: SignatureRequestId::generate(),
            contract_id: self.id.clone(),
            signers,
            provider,
            status: SignatureStatus::Pending,
            created_at: now,
        }))
    }

    /// Marks one signer. The last signature completes the request and signs the contract.
    pub fn record_signature(
        &mut self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<SignatureStatus, WorkflowError> {
        let email = email.trim().to_ascii_lowercase();
        if self.status != ContractStatus::Approved {
            return Err(InvalidStateFailure::NotApproved { status: self.status }.into());
        }
        let request = self
            .e_signature
            .as_mut()
            .filter(|request| request.status == SignatureStatus::Pending)
            .ok_or(InvalidStateFailure::NoActiveSignatureRequest)?;
        let signer = request
            .signers
            .iter_mut()
            .find(|signer| signer.email == email)
            .ok_or_else(|| ValidationFailure::UnknownSigner { email: email.clone() })?;
        if signer.signed {
            return Err(InvalidStateFailure::AlreadySigned { email }.into());
        }

        signer.signed = true;
        signer.signed_at = Some(now);
        let signer_name = signer.name.clone();
        let signer_role = signer.role.clone();

        if !request.all_signed() {
            self.touch(&signer_name, now);
            return Ok(SignatureStatus::Pending);
        }

        request.status = SignatureStatus::Completed;
        let provider = request.provider;
        self.status = ContractStatus::Signed;
        self.touch(&signer_name, now);
        self.append_version(NewVersion {
            title: self.title.clone(),
            content: self.current_content().to_string(),
            changes: format!("signed by all parties via {provider:?}"),
            change_type: ChangeType::Signed,
            changed_fields: Vec::new(),
            created_by: signer_name,
            created_by_role: signer_role,
            file_size: None,
            change_reason: None,
        });
        Ok(SignatureStatus::Completed)
    }

    pub fn cancel_signature(&mut self, actor: &User, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if !actor.can(Permission::Sign) {
            return Err(AuthorizationFailure::MissingPermission {
                user_id: actor.id.0.clone(),
                permission: Permission::Sign,
            }
            .into());
        }
        let request = self
            .e_signature
            .as_mut()
            .filter(|request| request.status == SignatureStatus::Pending)
            .ok_or(InvalidStateFailure::NoActiveSignatureRequest)?;

        request.status = SignatureStatus::Cancelled;
        self.touch(&actor.name, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::SignerInput;
    use crate::domain::contract::{Contract, ContractStatus, Priority};
    use crate::domain::signature::{SignatureProvider, SignatureStatus};
    use crate::domain::user::{User, UserRole};
    use crate::domain::version::ChangeType;
    use crate::errors::{InvalidStateFailure, ValidationFailure, WorkflowError};
    use crate::test_support::submitted_contract;

    fn director() -> User {
        User::with_role("u-5", "Giám đốc", "director@company.com", UserRole::Director)
    }

    fn signer(email: &str, name: &str) -> SignerInput {
        SignerInput { email: email.to_string(), name: name.to_string(), role: "Đại diện".to_string() }
    }

    fn approved_contract() -> Contract {
        let contract = submitted_contract(1_000_000, Priority::Low);
        assert_eq!(contract.status, ContractStatus::Approved);
        contract
    }

    #[test]
    fn signing_by_every_party_signs_the_contract() {
        let mut contract = approved_contract();
        contract
            .send_for_signature(
                vec![signer("a@partner.vn", "Bên A"), signer("B@Company.com", "Bên B")],
                SignatureProvider::Viettel,
                &director(),
                Utc::now(),
            )
            .expect("send");

        assert_eq!(
            contract.record_signature("a@partner.vn", Utc::now()).expect("first"),
            SignatureStatus::Pending
        );
        assert_eq!(contract.status, ContractStatus::Approved);
        assert_eq!(
            contract.record_signature("b@company.com", Utc::now()).expect("second"),
            SignatureStatus::Completed
        );

        assert_eq!(contract.status, ContractStatus::Signed);
        assert_eq!(
            contract.latest_version().map(|version| version.change_type),
            Some(ChangeType::Signed)
        );
        assert!(contract.active_signature_request().is_none());
    }

    #[test]
    fn unapproved_contracts_cannot_be_sent() {
        let mut contract = submitted_contract(15_000_000, Priority::Medium);
        let error = contract
            .send_for_signature(
                vec![signer("a@partner.vn", "Bên A")],
                SignatureProvider::DocuSign,
                &director(),
                Utc::now(),
            )
            .expect_err("pending contract");

        assert_eq!(
            error,
            WorkflowError::InvalidState(InvalidStateFailure::NotApproved {
                status: ContractStatus::Pending
            })
        );
        assert!(contract.e_signature.is_none());
    }

    #[test]
    fn incomplete_signers_are_dropped_and_none_left_is_an_error() {
        let mut contract = approved_contract();
        let error = contract
            .send_for_signature(
                vec![SignerInput {
                    email: "a@partner.vn".to_string(),
                    name: String::new(),
                    role: "Đại diện".to_string(),
                }],
                SignatureProvider::Adobe,
                &director(),
                Utc::now(),
            )
            .expect_err("no complete signer");

        assert_eq!(error, WorkflowError::Validation(ValidationFailure::NoSigners));
    }

    #[test]
    fn only_one_pending_request_at_a_time() {
        let mut contract = approved_contract();
        contract
            .send_for_signature(
                vec![signer("a@partner.vn", "Bên A")],
                SignatureProvider::DocuSign,
                &director(),
                Utc::now(),
            )
            .expect("send");

        let error = contract
            .send_for_signature(
                vec![signer("c@partner.vn", "Bên C")],
                SignatureProvider::DocuSign,
                &director(),
                Utc::now(),
            )
            .expect_err("already pending");
        assert_eq!(error, WorkflowError::InvalidState(InvalidStateFailure::SignatureRequestActive));

        contract.cancel_signature(&director(), Utc::now()).expect("cancel");
        contract
            .send_for_signature(
                vec![signer("c@partner.vn", "Bên C")],
                SignatureProvider::DocuSign,
                &director(),
                Utc::now(),
            )
            .expect("resend after cancel");
    }

    #[test]
    fn signing_twice_or_as_a_stranger_fails() {
        let mut contract = approved_contract();
        contract
            .send_for_signature(
                vec![signer("a@partner.vn", "Bên A"), signer("b@partner.vn", "Bên B")],
                SignatureProvider::DocuSign,
                &director(),
                Utc::now(),
            )
            .expect("send");
        contract.record_signature("a@partner.vn", Utc::now()).expect("sign");

        assert!(matches!(
            contract.record_signature("a@partner.vn", Utc::now()),
            Err(WorkflowError::InvalidState(InvalidStateFailure::AlreadySigned { .. }))
        ));
        assert!(matches!(
            contract.record_signature("x@elsewhere.vn", Utc::now()),
            Err(WorkflowError::Validation(ValidationFailure::UnknownSigner { .. }))
        ));
    }
}
