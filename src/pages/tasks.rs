use chrono::NaiveDateTime;

use crate::application::{ModalState, follow_up_toasts, save_record, save_toasts};
use crate::core::task_filter::{self, TaskFilter, TaskStats};
use crate::core::{Contact, Task};
use crate::forms::TaskForm;
use crate::message::Toast;
use crate::services::{ContactService, Crm, TrackedService};

pub struct TasksPage {
    service: TrackedService<Task>,
    contact_service: ContactService,
    pub tasks: Vec<Task>,
    pub contacts: Vec<Contact>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub search: String,
    pub filter: TaskFilter,
    pub modal: ModalState<Task>,
}

impl TasksPage {
    pub fn new(crm: &Crm) -> Self {
        Self {
            service: crm.tasks.clone(),
            contact_service: crm.contacts.service().clone(),
            tasks: Vec::new(),
            contacts: Vec::new(),
            is_loading: false,
            error: None,
            search: String::new(),
            filter: TaskFilter::All,
            modal: ModalState::default(),
        }
    }

    /// Fetch tasks and contacts together. Either failing leaves the page
    /// in its error state.
    pub async fn load(&mut self) {
        self.is_loading = true;
        self.error = None;

        let loaded = futures::try_join!(
            self.service.get_all(),
            self.contact_service.get_all()
        );
        match loaded {
            Ok((tasks, contacts)) => {
                log::info!("Loaded {} tasks, {} contacts", tasks.len(), contacts.len());
                self.tasks = tasks;
                self.contacts = contacts;
            }
            Err(e) => {
                log::error!("Tasks error: {}", e);
                self.error = Some("Failed to load tasks".to_string());
            }
        }
        self.is_loading = false;
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = term.to_string();
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.filter = filter;
    }

    pub fn visible(&self, now: NaiveDateTime) -> Vec<&Task> {
        task_filter::visible_tasks(&self.tasks, &self.contacts, &self.search, self.filter, now)
    }

    pub fn stats(&self, now: NaiveDateTime) -> TaskStats {
        TaskStats::compute(&self.tasks, now)
    }

    pub fn summary(&self, now: NaiveDateTime) -> String {
        task_filter::summary(
            self.visible(now).len(),
            self.tasks.len(),
            self.filter,
            &self.search,
        )
    }

    pub fn contact_name(&self, task: &Task) -> Option<&str> {
        task_filter::linked_contact(task, &self.contacts).map(|c| c.name.as_str())
    }

    fn find(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn replace(&mut self, task: Task) {
        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *slot = task;
        }
    }

    pub async fn delete(&mut self, id: i64) -> Vec<Toast> {
        let Some(task) = self.find(id).cloned() else {
            return vec![Toast::error("Task not found")];
        };

        match self.service.delete(&task).await {
            Ok(tracked) => {
                self.tasks.retain(|t| t.id != id);
                let mut toasts = vec![Toast::success("Task deleted successfully!")];
                toasts.extend(follow_up_toasts(&tracked, "Task deleted"));
                toasts
            }
            Err(e) => {
                log::error!("Delete task error: {}", e);
                vec![Toast::error("Failed to delete task")]
            }
        }
    }

    pub async fn toggle_complete(&mut self, id: i64) -> Vec<Toast> {
        let Some(task) = self.find(id).cloned() else {
            return Vec::new();
        };

        match self.service.toggle_complete(&task).await {
            Ok(tracked) => {
                let text = if tracked.value.completed {
                    "Task marked as completed!"
                } else {
                    "Task reopened!"
                };
                let mut toasts = vec![Toast::success(text)];
                toasts.extend(follow_up_toasts(&tracked, "Task updated"));
                self.replace(tracked.value);
                toasts
            }
            Err(e) => {
                log::error!("Toggle task error: {}", e);
                vec![Toast::error("Failed to update task")]
            }
        }
    }

    pub fn open_add(&mut self) {
        self.modal.open(None);
    }

    pub fn open_edit(&mut self, id: i64) {
        let task = self.find(id).cloned();
        if task.is_some() {
            self.modal.open(task);
        }
    }

    pub fn close_modal(&mut self) {
        self.modal.close();
    }

    /// Save the modal form; the modal stays open on failure.
    pub async fn save(&mut self, form: TaskForm) -> Vec<Toast> {
        let editing = self.modal.data.as_ref().map(|t| t.id);
        let input = if editing.is_some() {
            form.to_update_input()
        } else {
            form.to_create_input()
        };
        let result = save_record(&self.service, editing, input).await;
        let toasts = save_toasts(&result, "Task", editing.is_some());

        if let Ok(tracked) = result {
            match editing {
                Some(_) => self.replace(tracked.value),
                None => self.tasks.push(tracked.value),
            }
            self.modal.close();
        }
        toasts
    }
}
