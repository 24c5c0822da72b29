use std::fmt;

use crate::core::{Contact, Deal, Task};
use crate::forms::{ContactForm, DealForm, TaskForm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Warning,
    Error,
}

/// Short notification produced by a controller action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub text: String,
}

impl Toast {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for Toast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.level {
            ToastLevel::Success => "✓",
            ToastLevel::Warning => "!",
            ToastLevel::Error => "✗",
        };
        write!(f, "{} {}", marker, self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    Contact,
    Deal,
    Task,
}

/// Modal to open: `None` for a new record, `Some` to edit an existing one.
#[derive(Debug, Clone, PartialEq)]
pub enum ModalTarget {
    Contact(Option<Contact>),
    Deal(Option<Deal>),
    Task(Option<Task>),
}

impl ModalTarget {
    pub fn kind(&self) -> ModalKind {
        match self {
            Self::Contact(_) => ModalKind::Contact,
            Self::Deal(_) => ModalKind::Deal,
            Self::Task(_) => ModalKind::Task,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    OpenModal(ModalTarget),
    CloseModal(ModalKind),

    SaveContact(ContactForm),
    SaveDeal(DealForm),
    SaveTask(TaskForm),
}
