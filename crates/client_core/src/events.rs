use crate::{gate::Route, session::Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Info,
    Error,
}

/// A transient, user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Orders,
    Products,
    Quotes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    SessionChanged(Session),
    Navigate(Route),
    Toast(Toast),
    ListUpdated {
        list: ListKind,
        generation: u64,
    },
    ListFailed {
        list: ListKind,
        generation: u64,
        message: String,
    },
}
