use serde::{Deserialize, Serialize};

use crate::domain::contract::{Contract, ContractStatus};
use crate::domain::tag::TagId;

/// Contract list filter. Empty fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFilter {
    pub search: Option<String>,
    pub full_text: Option<String>,
    pub status: Option<ContractStatus>,
    pub tag_ids: Vec<TagId>,
}

impl ContractFilter {
    pub fn matches(&self, contract: &Contract) -> bool {
        self.matches_text(contract) && self.matches_status(contract) && self.matches_tags(contract)
    }

    pub fn apply<'a>(&self, contracts: &'a [Contract]) -> Vec<&'a Contract> {
        contracts.iter().filter(|contract| self.matches(contract)).collect()
    }

    fn matches_text(&self, contract: &Contract) -> bool {
        let needle = self.search.as_deref().map(str::to_lowercase).unwrap_or_default();
        let metadata_hit = contract.title.to_lowercase().contains(&needle)
            || contract.description.to_lowercase().contains(&needle);

        let full_text_hit = match self.full_text.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => {
                let query = query.to_lowercase();
                contract
                    .extracted_info
                    .as_ref()
                    .is_some_and(|info| info.full_text.to_lowercase().contains(&query))
            }
            _ => false,
        };

        metadata_hit || full_text_hit
    }

    fn matches_status(&self, contract: &Contract) -> bool {
        self.status.map_or(true, |status| contract.status == status)
    }

    fn matches_tags(&self, contract: &Contract) -> bool {
        self.tag_ids.is_empty() || self.tag_ids.iter().any(|tag| contract.tags.contains(tag))
    }
}
