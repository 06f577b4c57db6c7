//! Side channel for user-facing notices and engine progress messages.
//!
//! The pipeline never talks to a notification backend directly; it is handed a
//! `Notifier` and reports through it. Local runs use `LogNotifier`, tests and
//! offline callers can pass `NoopNotifier`.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

impl NoticeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NoticeKind::Info => "info",
            NoticeKind::Warning => "warning",
            NoticeKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, title, body)
    }

    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, title, body)
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeKind::Warning, title, body)
    }
}

pub trait Notifier {
    fn notify(&self, kind: NoticeKind, title: &str, body: &str);

    /// Structured progress message forwarded from the statistics engine.
    fn message(&self, message_type: &str, payload: &Value);

    fn send(&self, notice: &Notice) {
        self.notify(notice.kind, &notice.title, &notice.body);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _kind: NoticeKind, _title: &str, _body: &str) {}

    fn message(&self, _message_type: &str, _payload: &Value) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NoticeKind, title: &str, body: &str) {
        let kind_label = kind.as_str();
        match kind {
            NoticeKind::Info => tracing::info!(kind = kind_label, "{title}: {body}"),
            NoticeKind::Warning => tracing::warn!(kind = kind_label, "{title}: {body}"),
            NoticeKind::Error => tracing::error!(kind = kind_label, "{title}: {body}"),
        }
    }

    fn message(&self, message_type: &str, payload: &Value) {
        tracing::info!("local execution message [{message_type}]: {payload}");
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/notify.rs"]
pub(crate) mod tests;
