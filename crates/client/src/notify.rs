//! Toast notifications.

use dioxus::core::spawn_forever;
use dioxus::prelude::*;

/// How long an auto-dismissing toast stays up.
pub const AUTO_DISMISS_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToastOptions {
    pub kind: ToastKind,
    pub auto_dismiss: bool,
}

impl ToastOptions {
    pub fn success() -> Self {
        Self {
            kind: ToastKind::Success,
            auto_dismiss: true,
        }
    }

    pub fn error() -> Self {
        Self {
            kind: ToastKind::Error,
            auto_dismiss: true,
        }
    }
}

impl Default for ToastOptions {
    fn default() -> Self {
        Self {
            kind: ToastKind::Info,
            auto_dismiss: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub options: ToastOptions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToastQueue {
    next_id: u64,
    toasts: Vec<Toast>,
}

impl ToastQueue {
    pub fn push(&mut self, message: impl Into<String>, options: ToastOptions) -> u64 {
        self.next_id += 1;
        self.toasts.push(Toast {
            id: self.next_id,
            message: message.into(),
            options,
        });
        self.next_id
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.id != id);
        self.toasts.len() != before
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }
}

pub static TOASTS: GlobalSignal<ToastQueue> = Signal::global(ToastQueue::default);

/// Show a toast; auto-dismissing toasts are removed after [`AUTO_DISMISS_MS`].
pub fn push(message: impl Into<String>, options: ToastOptions) -> u64 {
    let id = TOASTS.write().push(message, options);
    if options.auto_dismiss {
        spawn_forever(async move {
            crate::runtime::sleep_ms(AUTO_DISMISS_MS).await;
            dismiss(id);
        });
    }
    id
}

pub fn dismiss(id: u64) {
    TOASTS.write().dismiss(id);
}

#[component]
pub fn ToastHost() -> Element {
    let toasts = TOASTS.read().toasts().to_vec();

    rsx! {
        div { class: "fixed top-4 right-4 z-50 flex flex-col gap-2 w-80",
            for toast in toasts {
                div {
                    key: "{toast.id}",
                    class: format!(
                        "flex items-start justify-between rounded-lg px-4 py-3 text-sm shadow-lg {}",
                        match toast.options.kind {
                            ToastKind::Info => "bg-sky-100 text-sky-900",
                            ToastKind::Success => "bg-green-100 text-green-900",
                            ToastKind::Error => "bg-red-100 text-red-900",
                        },
                    ),
                    span { "{toast.message}" }
                    button {
                        class: "ml-3 font-bold opacity-60 hover:opacity-100",
                        onclick: move |_| dismiss(toast.id),
                        "×"
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toasts_keep_order_and_dismiss_by_id() {
        let mut queue = ToastQueue::default();
        let first = queue.push("Saved", ToastOptions::success());
        let second = queue.push("Please read and agree to the terms and conditions first.", ToastOptions::error());

        assert_eq!(queue.toasts().len(), 2);
        assert!(queue.dismiss(first));
        assert!(!queue.dismiss(first));
        assert_eq!(queue.toasts()[0].id, second);
        assert_eq!(queue.toasts()[0].options.kind, ToastKind::Error);
    }
}
