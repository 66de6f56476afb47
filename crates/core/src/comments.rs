use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::contract::ContractId;
use crate::domain::user::{User, UserId};
use crate::errors::{ValidationFailure, WorkflowError};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommentId(pub String);

/// Character range of the highlighted passage within the current content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractComment {
    pub id: CommentId,
    pub contract_id: ContractId,
    pub user_id: UserId,
    pub user_name: String,
    pub content: String,
    pub highlighted_text: Option<String>,
    pub position: Option<TextSpan>,
    pub created_at: DateTime<Utc>,
    pub is_resolved: bool,
}

impl ContractComment {
    pub fn new(
        contract_id: ContractId,
        author: &User,
        content: &str,
        highlight: Option<(String, TextSpan)>,
        now: DateTime<Utc>,
    ) -> Result<Self, WorkflowError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationFailure::EmptyField { field: "content" }.into());
        }
        let (highlighted_text, position) = match highlight {
            Some((text, span)) if span.start <= span.end => (Some(text), Some(span)),
            Some((text, _)) => (Some(text), None),
            None => (None, None),
        };

        Ok(Self {
            id: CommentId(format!("cm-{}", Uuid::new_v4())),
            contract_id,
            user_id: author.id.clone(),
            user_name: author.name.clone(),
            content: content.to_string(),
            highlighted_text,
            position,
            created_at: now,
            is_resolved: false,
        })
    }

    pub fn resolve(&mut self) {
        self.is_resolved = true;
    }
}
