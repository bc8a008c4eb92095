use dioxus::prelude::*;

/// Labelled text input with an optional field error underneath.
#[component]
pub fn Input(
    label: String,
    name: String,
    value: String,
    #[props(default = "text".to_string())] kind: String,
    #[props(default)] error: Option<String>,
    oninput: EventHandler<String>,
) -> Element {
    let border = if error.is_some() { "border-red-500" } else { "border-gray-300" };

    rsx! {
        div { class: "mb-4",
            label { class: "mb-1 block text-sm font-semibold", r#for: "{name}", "{label}" }
            input {
                id: "{name}",
                name: "{name}",
                r#type: "{kind}",
                value: "{value}",
                class: "w-full rounded border px-3 py-2 {border}",
                oninput: move |evt| oninput.call(evt.value()),
            }
            if let Some(error) = error {
                p { class: "mt-1 text-xs text-red-600", "{error}" }
            }
        }
    }
}
