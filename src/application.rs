use crate::core::{Contact, Deal, Entity, Loose, Task};
use crate::error::ServiceError;
use crate::message::{Message, ModalKind, ModalTarget, Toast};
use crate::services::{Crm, Tracked, TrackedService};

/// Open/closed state of one modal plus the record being edited, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalState<T> {
    pub is_open: bool,
    pub data: Option<T>,
}

impl<T> Default for ModalState<T> {
    fn default() -> Self {
        Self {
            is_open: false,
            data: None,
        }
    }
}

impl<T> ModalState<T> {
    pub fn open(&mut self, data: Option<T>) {
        self.is_open = true;
        self.data = data;
    }

    pub fn close(&mut self) {
        self.is_open = false;
        self.data = None;
    }
}

/// Warning toasts for follow-up writes that failed after `what` succeeded.
pub(crate) fn follow_up_toasts<T>(tracked: &Tracked<T>, what: &str) -> Vec<Toast> {
    tracked
        .follow_up_errors
        .iter()
        .map(|e| Toast::warning(format!("{}, but the activity log was not updated: {}", what, e)))
        .collect()
}

/// Create when `editing` is `None`, otherwise update that record.
pub(crate) async fn save_record<E: Entity>(
    service: &TrackedService<E>,
    editing: Option<i64>,
    input: Result<Loose, ServiceError>,
) -> Result<Tracked<E>, ServiceError> {
    let input = input?;
    match editing {
        Some(id) => service.update(id, &input).await,
        None => service.create(&input).await,
    }
}

/// Shared outcome reporting for modal saves.
pub(crate) fn save_toasts<E>(
    result: &Result<Tracked<E>, ServiceError>,
    label: &str,
    editing: bool,
) -> Vec<Toast> {
    match result {
        Ok(tracked) => {
            let done = if editing { "updated" } else { "added" };
            let mut toasts = vec![Toast::success(format!("{} {} successfully!", label, done))];
            toasts.extend(follow_up_toasts(tracked, &format!("{} {}", label, done)));
            toasts
        }
        Err(ServiceError::Validation(reason)) => vec![Toast::error(reason.clone())],
        Err(e) => {
            log::error!("Save {} error: {}", label.to_lowercase(), e);
            vec![Toast::error(format!("Failed to save {}", label.to_lowercase()))]
        }
    }
}

/// The application shell: owns the services and the three record modals.
pub struct Layout {
    crm: Crm,
    pub contact_modal: ModalState<Contact>,
    pub deal_modal: ModalState<Deal>,
    pub task_modal: ModalState<Task>,
}

impl Layout {
    pub fn new(crm: Crm) -> Self {
        Self {
            crm,
            contact_modal: ModalState::default(),
            deal_modal: ModalState::default(),
            task_modal: ModalState::default(),
        }
    }

    pub fn crm(&self) -> &Crm {
        &self.crm
    }

    pub fn is_open(&self, kind: ModalKind) -> bool {
        match kind {
            ModalKind::Contact => self.contact_modal.is_open,
            ModalKind::Deal => self.deal_modal.is_open,
            ModalKind::Task => self.task_modal.is_open,
        }
    }

    pub async fn update(&mut self, message: Message) -> Vec<Toast> {
        match message {
            Message::OpenModal(target) => {
                log::debug!("Opening {:?} modal", target.kind());
                match target {
                    ModalTarget::Contact(data) => self.contact_modal.open(data),
                    ModalTarget::Deal(data) => self.deal_modal.open(data),
                    ModalTarget::Task(data) => self.task_modal.open(data),
                }
                Vec::new()
            }

            Message::CloseModal(kind) => {
                match kind {
                    ModalKind::Contact => self.contact_modal.close(),
                    ModalKind::Deal => self.deal_modal.close(),
                    ModalKind::Task => self.task_modal.close(),
                }
                Vec::new()
            }

            Message::SaveContact(form) => {
                let editing = self.contact_modal.data.as_ref().map(|c| c.id);
                let result =
                    save_record(&self.crm.contacts, editing, form.to_input()).await;
                if result.is_ok() {
                    self.contact_modal.close();
                }
                save_toasts(&result, "Contact", editing.is_some())
            }

            Message::SaveDeal(form) => {
                let editing = self.deal_modal.data.as_ref().map(|d| d.id);
                let result = save_record(&self.crm.deals, editing, form.to_input()).await;
                if result.is_ok() {
                    self.deal_modal.close();
                }
                save_toasts(&result, "Deal", editing.is_some())
            }

            Message::SaveTask(form) => {
                let editing = self.task_modal.data.as_ref().map(|t| t.id);
                let input = if editing.is_some() {
                    form.to_update_input()
                } else {
                    form.to_create_input()
                };
                let result = save_record(&self.crm.tasks, editing, input).await;
                if result.is_ok() {
                    self.task_modal.close();
                }
                save_toasts(&result, "Task", editing.is_some())
            }
        }
    }
}
