use crate::application::follow_up_toasts;
use crate::core::Contact;
use crate::message::Toast;
use crate::services::{Crm, TrackedService};

pub struct ContactsPage {
    service: TrackedService<Contact>,
    pub contacts: Vec<Contact>,
    pub error: Option<String>,
    pub search: String,
}

impl ContactsPage {
    pub fn new(crm: &Crm) -> Self {
        Self {
            service: crm.contacts.clone(),
            contacts: Vec::new(),
            error: None,
            search: String::new(),
        }
    }

    pub async fn load(&mut self) {
        self.error = None;
        match self.service.get_all().await {
            Ok(contacts) => self.contacts = contacts,
            Err(e) => {
                log::error!("Contacts error: {}", e);
                self.error = Some("Failed to load contacts".to_string());
            }
        }
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = term.to_string();
    }

    /// Contacts matching the search term, ordered by name.
    pub fn visible(&self) -> Vec<&Contact> {
        let needle = self.search.trim().to_lowercase();
        let mut visible: Vec<&Contact> = self
            .contacts
            .iter()
            .filter(|c| needle.is_empty() || c.matches(&needle))
            .collect();
        visible.sort_by_cached_key(|c| c.name.to_lowercase());
        visible
    }

    pub async fn delete(&mut self, id: i64) -> Vec<Toast> {
        let Some(contact) = self.contacts.iter().find(|c| c.id == id).cloned() else {
            return vec![Toast::error("Contact not found")];
        };

        match self.service.delete(&contact).await {
            Ok(tracked) => {
                self.contacts.retain(|c| c.id != id);
                let mut toasts = vec![Toast::success("Contact deleted successfully!")];
                toasts.extend(follow_up_toasts(&tracked, "Contact deleted"));
                toasts
            }
            Err(e) => {
                log::error!("Delete contact error: {}", e);
                vec![Toast::error("Failed to delete contact")]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::memory::MemoryRecordClient;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn search_covers_company_email_and_tags() {
        let store = Arc::new(MemoryRecordClient::new());
        let crm = Crm::new(store.clone(), 1000);
        for contact in [
            json!({"name": "grace Hopper", "company": "Navy", "tags": "admiral"}),
            json!({"name": "Ada Lovelace", "email": "ada@engines.example", "tags": "vip, math"}),
        ] {
            crm.contacts
                .create(contact.as_object().unwrap())
                .await
                .unwrap();
        }

        let mut page = ContactsPage::new(&crm);
        page.load().await;
        let names: Vec<&str> = page.visible().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ada Lovelace", "grace Hopper"]);

        page.set_search("NAVY");
        assert_eq!(page.visible()[0].name, "grace Hopper");
        page.set_search("engines");
        assert_eq!(page.visible()[0].name, "Ada Lovelace");
        page.set_search("vip");
        assert_eq!(page.visible().len(), 1);
        page.set_search("nobody");
        assert!(page.visible().is_empty());
    }

    #[tokio::test]
    async fn delete_records_activity() {
        let store = Arc::new(MemoryRecordClient::new());
        let crm = Crm::new(store.clone(), 1000);
        crm.contacts
            .create(json!({"name": "Ada"}).as_object().unwrap())
            .await
            .unwrap();

        let mut page = ContactsPage::new(&crm);
        page.load().await;
        assert_eq!(
            page.delete(1).await,
            vec![Toast::success("Contact deleted successfully!")]
        );
        assert!(page.contacts.is_empty());
        assert_eq!(page.delete(1).await, vec![Toast::error("Contact not found")]);

        let last = store.rows("activity_c").await.pop().unwrap();
        assert_eq!(last["description_c"], json!("Contact deleted: Ada"));
    }
}
