use dioxus::prelude::*;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonVariant {
    #[default]
    Primary,
    Light,
}

#[derive(Props, Clone, PartialEq)]
pub struct ButtonProps {
    #[props(optional)]
    pub class: Option<String>,
    #[props(optional)]
    pub variant: Option<ButtonVariant>,
    #[props(optional)]
    pub r#type: Option<String>,
    /// Shows a spinner and ignores clicks.
    #[props(optional)]
    pub loading: Option<bool>,
    #[props(optional)]
    pub onclick: Option<EventHandler<MouseEvent>>,
    pub children: Element,
}

#[component]
pub fn Button(props: ButtonProps) -> Element {
    let variant = props.variant.unwrap_or_default();
    let loading = props.loading.unwrap_or(false);

    let base = "inline-flex items-center justify-center gap-2 rounded px-4 py-2 text-sm font-semibold transition-colors focus:outline-none focus:ring-2 disabled:opacity-60 disabled:pointer-events-none";

    let variant_class = match variant {
        ButtonVariant::Primary => "bg-blue-600 text-white hover:bg-blue-500 focus:ring-blue-400",
        ButtonVariant::Light => "bg-blue-50 text-blue-700 hover:bg-blue-100 focus:ring-blue-200",
    };

    let class = match props.class {
        Some(extra) if !extra.is_empty() => format!("{} {} {}", base, variant_class, extra),
        _ => format!("{} {}", base, variant_class),
    };

    rsx! {
        button {
            class,
            r#type: props.r#type.unwrap_or_else(|| "button".to_string()),
            disabled: loading,
            onclick: move |evt| {
                if loading {
                    return;
                }
                if let Some(handler) = &props.onclick {
                    handler.call(evt);
                }
            },
            if loading {
                span { class: "h-4 w-4 animate-spin rounded-full border-2 border-current border-t-transparent" }
            }
            {props.children}
        }
    }
}
