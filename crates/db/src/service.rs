use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use contractflow_core::analytics::{AnalyticsOptions, DashboardStats};
use contractflow_core::approvals::{apply_approval_flow, FlowDerivationInput, FlowDeriver};
use contractflow_core::audit::{AuditContext, AuditSink, NoopAuditSink};
use contractflow_core::comments::{ContractComment, TextSpan};
use contractflow_core::config::AppConfig;
use contractflow_core::domain::approval::ApprovalStep;
use contractflow_core::domain::contract::{Contract, ContractId, ContractStatus};
use contractflow_core::domain::reminder::ContractReminder;
use contractflow_core::domain::signature::{ESignatureRequest, SignatureProvider, SignatureStatus};
use contractflow_core::domain::user::{Permission, User, UserId};
use contractflow_core::domain::version::ContractEdit;
use contractflow_core::errors::{
    ApplicationError, AuthorizationFailure, InvalidStateFailure, WorkflowError,
};
use contractflow_core::esign::SignerInput;
use contractflow_core::flows::{
    audit_resolution, ApprovalEngine, ResolveStepRequest, StepResolution,
};
use contractflow_core::intake::{
    intake_manual, intake_upload, IntakeDefaults, ManualContract, UploadedDocument,
};
use contractflow_core::reminders::NewReminder;
use contractflow_core::search::ContractFilter;

use crate::repositories::{
    CommentRepository, ContractRepository, RepositoryError, UserRepository,
};

const DEFAULT_EXPIRY_REMINDER_DAYS: u32 = 14;

/// Loads, mutates and stores contracts. Operations on one contract are serialized
/// and every write is checked against the revision it was loaded at.
pub struct ContractWorkflowService<C, U, M> {
    contracts: Arc<C>,
    users: Arc<U>,
    comments: Arc<M>,
    deriver: FlowDeriver,
    engine: ApprovalEngine,
    intake_defaults: IntakeDefaults,
    analytics: AnalyticsOptions,
    expiry_reminder_days: u32,
    audit: Arc<dyn AuditSink>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<C, U, M> ContractWorkflowService<C, U, M>
where
    C: ContractRepository,
    U: UserRepository,
    M: CommentRepository,
{
    pub fn new(contracts: Arc<C>, users: Arc<U>, comments: Arc<M>) -> Self {
        Self {
            contracts,
            users,
            comments,
            deriver: FlowDeriver::default(),
            engine: ApprovalEngine::default(),
            intake_defaults: IntakeDefaults::default(),
            analytics: AnalyticsOptions::default(),
            expiry_reminder_days: DEFAULT_EXPIRY_REMINDER_DAYS,
            audit: Arc::new(NoopAuditSink),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(
        contracts: Arc<C>,
        users: Arc<U>,
        comments: Arc<M>,
        config: &AppConfig,
    ) -> Self {
        let mut service = Self::new(contracts, users, comments);
        service.engine = ApprovalEngine::new(config.approval_policy());
        service.intake_defaults = config.intake_defaults();
        service.analytics = config.analytics_options();
        service.expiry_reminder_days = config.intake.expiry_reminder_days;
        service
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn with_deriver(mut self, deriver: FlowDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    pub fn engine(&self) -> &ApprovalEngine {
        &self.engine
    }

    pub async fn find_contract(&self, id: &ContractId) -> Result<Contract, ApplicationError> {
        self.contracts
            .find_by_id(id)
            .await
            .map_err(persistence_error)?
            .ok_or_else(|| ApplicationError::NotFound { entity: "contract", id: id.0.clone() })
    }

    pub async fn find_user(&self, id: &UserId) -> Result<User, ApplicationError> {
        self.users
            .find_by_id(id)
            .await
            .map_err(persistence_error)?
            .ok_or_else(|| ApplicationError::NotFound { entity: "user", id: id.0.clone() })
    }

    pub async fn create_from_upload(
        &self,
        document: UploadedDocument,
        author_id: &UserId,
    ) -> Result<Contract, ApplicationError> {
        let author = self.find_user(author_id).await?;
        let contract = intake_upload(document, &author, &self.intake_defaults, Utc::now())?;
        let stored = self.store_new(contract).await?;

        info!(
            event_name = "contract.created",
            contract_id = %stored.id.0,
            source = "upload",
            actor = %author.id.0,
            "contract created from upload"
        );
        Ok(stored)
    }

    pub async fn create_manual(
        &self,
        manual: ManualContract,
        author_id: &UserId,
    ) -> Result<Contract, ApplicationError> {
        let author = self.find_user(author_id).await?;
        let mut contract = intake_manual(manual, &author, &self.intake_defaults, Utc::now())?;
        contract.schedule_expiry_reminder(self.expiry_reminder_days);
        let stored = self.store_new(contract).await?;

        info!(
            event_name = "contract.created",
            contract_id = %stored.id.0,
            source = "manual",
            actor = %author.id.0,
            "contract created manually"
        );
        Ok(stored)
    }

    /// Recomputes the flow from the current value and priority.
    pub async fn derive_flow(
        &self,
        contract_id: &ContractId,
    ) -> Result<Vec<ApprovalStep>, ApplicationError> {
        let deriver = &self.deriver;
        let stored = self
            .mutate(contract_id, "contract.flow_derived", |contract| {
                let steps = deriver.derive(&FlowDerivationInput::for_contract(contract))?;
                apply_approval_flow(contract, steps)?;
                Ok(())
            })
            .await?
            .1;

        Ok(stored.approval_steps)
    }

    pub async fn submit_for_approval(
        &self,
        contract_id: &ContractId,
        submitter_id: &UserId,
    ) -> Result<ContractStatus, ApplicationError> {
        let submitter = self.find_user(submitter_id).await?;
        let deriver = &self.deriver;
        let (status, _) = self
            .mutate(contract_id, "contract.submitted", |contract| {
                let steps = deriver.derive(&FlowDerivationInput::for_contract(contract))?;
                Ok(contract.submit_for_approval(steps, &submitter, Utc::now())?)
            })
            .await?;

        Ok(status)
    }

    pub async fn resolve_step(
        &self,
        contract_id: &ContractId,
        request: ResolveStepRequest,
        acting_user_id: &UserId,
        correlation_id: &str,
    ) -> Result<StepResolution, ApplicationError> {
        let acting_user = self.find_user(acting_user_id).await?;
        let audit = AuditContext::new(
            Some(contract_id.clone()),
            correlation_id,
            acting_user.id.0.clone(),
        );
        let engine = &self.engine;
        let outcome = self
            .mutate(contract_id, "contract.step_resolved", |contract| {
                Ok(engine.resolve_step_at(contract, &request, &acting_user, Utc::now())?)
            })
            .await
            .map(|(resolution, _)| resolution);

        audit_resolution(self.audit.as_ref(), &audit, &request, outcome.as_ref());
        outcome
    }

    /// Returns the new version number when the edit changed title or content.
    pub async fn edit_contract(
        &self,
        contract_id: &ContractId,
        edit: ContractEdit,
        editor_id: &UserId,
    ) -> Result<Option<u32>, ApplicationError> {
        let editor = self.find_user(editor_id).await?;
        let (version, _) = self
            .mutate(contract_id, "contract.edited", |contract| {
                Ok(contract.apply_edit(edit, &editor, Utc::now())?)
            })
            .await?;

        Ok(version)
    }

    pub async fn send_for_signature(
        &self,
        contract_id: &ContractId,
        signers: Vec<SignerInput>,
        provider: SignatureProvider,
        sender_id: &UserId,
    ) -> Result<ESignatureRequest, ApplicationError> {
        let sender = self.find_user(sender_id).await?;
        let (request, _) = self
            .mutate(contract_id, "contract.signature_requested", |contract| {
                Ok(contract.send_for_signature(signers, provider, &sender, Utc::now())?.clone())
            })
            .await?;

        Ok(request)
    }

    pub async fn record_signature(
        &self,
        contract_id: &ContractId,
        email: &str,
    ) -> Result<SignatureStatus, ApplicationError> {
        let (status, _) = self
            .mutate(contract_id, "contract.signature_recorded", |contract| {
                Ok(contract.record_signature(email, Utc::now())?)
            })
            .await?;

        Ok(status)
    }

    pub async fn add_reminder(
        &self,
        contract_id: &ContractId,
        reminder: NewReminder,
    ) -> Result<ContractReminder, ApplicationError> {
        let (reminder, _) = self
            .mutate(contract_id, "contract.reminder_added", |contract| {
                Ok(contract.add_reminder(reminder)?.clone())
            })
            .await?;

        Ok(reminder)
    }

    pub async fn add_comment(
        &self,
        contract_id: &ContractId,
        author_id: &UserId,
        content: &str,
        highlight: Option<(String, TextSpan)>,
    ) -> Result<ContractComment, ApplicationError> {
        let author = self.find_user(author_id).await?;
        let contract = self.find_contract(contract_id).await?;
        let comment = ContractComment::new(contract.id, &author, content, highlight, Utc::now())?;
        self.comments.save(comment.clone()).await.map_err(persistence_error)?;

        info!(
            event_name = "contract.comment_added",
            contract_id = %contract_id.0,
            actor = %author.id.0,
            "comment added"
        );
        Ok(comment)
    }

    pub async fn comments(
        &self,
        contract_id: &ContractId,
    ) -> Result<Vec<ContractComment>, ApplicationError> {
        self.comments.list_for_contract(contract_id).await.map_err(persistence_error)
    }

    pub async fn search(&self, filter: &ContractFilter) -> Result<Vec<Contract>, ApplicationError> {
        let contracts = self.contracts.list().await.map_err(persistence_error)?;
        Ok(contracts.into_iter().filter(|contract| filter.matches(contract)).collect())
    }

    pub async fn dashboard(
        &self,
        viewer_id: &UserId,
        today: NaiveDate,
    ) -> Result<DashboardStats, ApplicationError> {
        let viewer = self.find_user(viewer_id).await?;
        if !viewer.can(Permission::ViewAnalytics) {
            return Err(WorkflowError::from(AuthorizationFailure::MissingPermission {
                user_id: viewer.id.0.clone(),
                permission: Permission::ViewAnalytics,
            })
            .into());
        }

        let contracts = self.contracts.list().await.map_err(persistence_error)?;
        Ok(DashboardStats::compute(&contracts, today, self.analytics))
    }

    /// Moves every contract past its expiry date to `Expired`; returns how many moved.
    pub async fn expire_due_contracts(&self, today: NaiveDate) -> Result<usize, ApplicationError> {
        let due: Vec<ContractId> = self
            .contracts
            .list()
            .await
            .map_err(persistence_error)?
            .into_iter()
            .filter(|contract| {
                contract.expiry_date.is_some_and(|expiry| expiry < today)
                    && contract.can_transition_to(ContractStatus::Expired)
            })
            .map(|contract| contract.id)
            .collect();

        let mut expired = 0;
        for id in due {
            let (moved, _) = self
                .mutate(&id, "contract.expired", |contract| Ok(contract.expire_if_due(today)))
                .await?;
            if moved {
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn lock_for(&self, contract_id: &ContractId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(contract_id.0.clone()).or_default().clone()
    }

    /// Drops the entry once no other operation holds or waits on it.
    async fn release_lock(&self, contract_id: &ContractId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        drop(lock);
        if locks.get(&contract_id.0).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(&contract_id.0);
        }
    }

    async fn store_new(&self, contract: Contract) -> Result<Contract, ApplicationError> {
        let expected = contract.revision;
        self.contracts.save_if_revision(contract, expected).await.map_err(persistence_error)
    }

    /// Runs `apply` against the stored contract under its lock and writes the result back.
    /// A failed `apply` stores nothing.
    async fn mutate<R, F>(
        &self,
        contract_id: &ContractId,
        event_name: &'static str,
        apply: F,
    ) -> Result<(R, Contract), ApplicationError>
    where
        F: FnOnce(&mut Contract) -> Result<R, ApplicationError>,
    {
        let lock = self.lock_for(contract_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.load_apply_store(contract_id, event_name, apply).await
        };
        self.release_lock(contract_id, lock).await;
        result
    }

    async fn load_apply_store<R, F>(
        &self,
        contract_id: &ContractId,
        event_name: &'static str,
        apply: F,
    ) -> Result<(R, Contract), ApplicationError>
    where
        F: FnOnce(&mut Contract) -> Result<R, ApplicationError>,
    {
        let mut contract = self.find_contract(contract_id).await?;
        let expected = contract.revision;
        let output = match apply(&mut contract) {
            Ok(output) => output,
            Err(error) => {
                warn!(
                    event_name,
                    contract_id = %contract_id.0,
                    error = %error,
                    "contract operation rejected"
                );
                return Err(error);
            }
        };

        let stored =
            self.contracts.save_if_revision(contract, expected).await.map_err(persistence_error)?;
        info!(
            event_name,
            contract_id = %stored.id.0,
            status = %stored.status,
            revision = stored.revision,
            "contract updated"
        );
        Ok((output, stored))
    }
}

fn persistence_error(error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::RevisionConflict { id, expected, actual } => {
            WorkflowError::from(InvalidStateFailure::ConcurrentModification {
                contract_id: id,
                expected,
                actual,
            })
            .into()
        }
        RepositoryError::Storage(message) => ApplicationError::Persistence(message),
    }
}
