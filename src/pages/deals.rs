use serde_json::Value;

use crate::application::follow_up_toasts;
use crate::core::{Contact, Deal, DealStage, Loose};
use crate::message::Toast;
use crate::services::{ContactService, Crm, TrackedService};

/// One pipeline column.
#[derive(Debug, Clone, PartialEq)]
pub struct StageColumn<'a> {
    pub stage: DealStage,
    pub deals: Vec<&'a Deal>,
    pub total: f64,
    pub weighted: f64,
}

pub struct DealsPage {
    service: TrackedService<Deal>,
    contact_service: ContactService,
    pub deals: Vec<Deal>,
    pub contacts: Vec<Contact>,
    pub error: Option<String>,
}

impl DealsPage {
    pub fn new(crm: &Crm) -> Self {
        Self {
            service: crm.deals.clone(),
            contact_service: crm.contacts.service().clone(),
            deals: Vec::new(),
            contacts: Vec::new(),
            error: None,
        }
    }

    pub async fn load(&mut self) {
        self.error = None;
        match futures::try_join!(self.service.get_all(), self.contact_service.get_all()) {
            Ok((deals, contacts)) => {
                self.deals = deals;
                self.contacts = contacts;
            }
            Err(e) => {
                log::error!("Deals error: {}", e);
                self.error = Some("Failed to load deals".to_string());
            }
        }
    }

    pub fn contact_name(&self, deal: &Deal) -> Option<&str> {
        let id = deal.contact_id?;
        self.contacts
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }

    /// Deals grouped by stage in pipeline order. Stages outside the known
    /// pipeline follow in order of first appearance.
    pub fn pipeline(&self) -> Vec<StageColumn<'_>> {
        let mut stages: Vec<DealStage> = DealStage::PIPELINE.to_vec();
        for deal in &self.deals {
            if !stages.contains(&deal.stage) {
                stages.push(deal.stage.clone());
            }
        }

        stages
            .into_iter()
            .map(|stage| {
                let deals: Vec<&Deal> = self.deals.iter().filter(|d| d.stage == stage).collect();
                StageColumn {
                    total: deals.iter().map(|d| d.value).sum(),
                    weighted: deals.iter().map(|d| d.weighted_value()).sum(),
                    stage,
                    deals,
                }
            })
            .collect()
    }

    /// Value of all deals not yet closed, weighted by probability.
    pub fn open_weighted_value(&self) -> f64 {
        self.deals
            .iter()
            .filter(|d| !d.stage.is_closed())
            .map(Deal::weighted_value)
            .sum()
    }

    pub async fn move_to_stage(&mut self, id: i64, stage: DealStage) -> Vec<Toast> {
        if !self.deals.iter().any(|d| d.id == id) {
            return vec![Toast::error("Deal not found")];
        }

        let mut input = Loose::new();
        input.insert("stage_c".to_string(), Value::from(stage.as_str()));
        match self.service.update(id, &input).await {
            Ok(tracked) => {
                let mut toasts = vec![Toast::success(format!("Deal moved to {}", stage))];
                toasts.extend(follow_up_toasts(&tracked, "Deal updated"));
                if let Some(slot) = self.deals.iter_mut().find(|d| d.id == id) {
                    *slot = tracked.value;
                }
                toasts
            }
            Err(e) => {
                log::error!("Update deal stage error: {}", e);
                vec![Toast::error("Failed to update deal")]
            }
        }
    }

    pub async fn delete(&mut self, id: i64) -> Vec<Toast> {
        let Some(deal) = self.deals.iter().find(|d| d.id == id).cloned() else {
            return vec![Toast::error("Deal not found")];
        };

        match self.service.delete(&deal).await {
            Ok(tracked) => {
                self.deals.retain(|d| d.id != id);
                let mut toasts = vec![Toast::success("Deal deleted successfully!")];
                toasts.extend(follow_up_toasts(&tracked, "Deal deleted"));
                toasts
            }
            Err(e) => {
                log::error!("Delete deal error: {}", e);
                vec![Toast::error("Failed to delete deal")]
            }
        }
    }
}
