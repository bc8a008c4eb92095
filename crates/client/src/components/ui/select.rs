use dioxus::prelude::*;
use relieflink_shared::SelectOption;
use serde_json::{json, Value};

/// The untyped value a `<select>` hands back: `{ value, label }` with the
/// value as a string, or `null` when cleared.
fn widget_value(options: &[SelectOption], raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    let label = options
        .iter()
        .find(|o| o.value.to_string() == raw)
        .map(|o| o.label.clone())
        .unwrap_or_default();
    json!({ "value": raw, "label": label })
}

#[component]
pub fn Select(
    #[props(default)] label: Option<String>,
    placeholder: String,
    options: Vec<SelectOption>,
    value: Option<SelectOption>,
    #[props(default)] loading: bool,
    #[props(default)] disabled: bool,
    #[props(default)] error: Option<String>,
    #[props(default)] help: Option<String>,
    onchange: EventHandler<Value>,
) -> Element {
    let selected = value.map(|v| v.value.to_string()).unwrap_or_default();
    let placeholder = if loading { "Loading...".to_string() } else { placeholder };
    let lookup = options.clone();

    rsx! {
        div { class: "mb-4",
            if let Some(text) = label {
                label { class: "mb-1 block text-sm font-semibold", "{text}" }
            }
            select {
                class: "w-full rounded border border-gray-300 bg-white px-3 py-2",
                disabled: disabled || loading,
                value: "{selected}",
                onchange: move |evt| onchange.call(widget_value(&lookup, &evt.value())),
                option { value: "", "{placeholder}" }
                for opt in options {
                    option {
                        key: "{opt.value}",
                        value: "{opt.value}",
                        selected: opt.value.to_string() == selected,
                        "{opt.label}"
                    }
                }
            }
            if let Some(help) = help {
                p { class: "mt-1 text-xs text-gray-500", "{help}" }
            }
            if let Some(error) = error {
                p { class: "mt-1 text-xs text-red-600", "{error}" }
            }
        }
    }
}

/// Multi-choice list of options.
#[component]
pub fn CheckboxGroup(
    title: String,
    options: Vec<SelectOption>,
    selected: Vec<SelectOption>,
    #[props(default)] loading: bool,
    #[props(default)] error: Option<String>,
    onchange: EventHandler<Vec<SelectOption>>,
) -> Element {
    rsx! {
        div { class: "mb-4",
            p { class: "mb-1 text-sm font-semibold", "{title}" }
            if loading {
                p { class: "text-sm text-gray-500", "Loading..." }
            }
            div { class: "grid grid-cols-2 gap-1",
                for opt in options {
                    label { key: "{opt.value}", class: "flex items-center gap-2 text-sm",
                        input {
                            r#type: "checkbox",
                            checked: selected.contains(&opt),
                            onchange: {
                                let opt = opt.clone();
                                let selected = selected.clone();
                                move |evt: Event<FormData>| {
                                    let mut next: Vec<SelectOption> =
                                        selected.iter().filter(|s| s.value != opt.value).cloned().collect();
                                    if evt.checked() {
                                        next.push(opt.clone());
                                    }
                                    onchange.call(next);
                                }
                            },
                        }
                        "{opt.label}"
                    }
                }
            }
            if let Some(error) = error {
                p { class: "mt-1 text-xs text-red-600", "{error}" }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widget_value_round_trips_through_select_option() {
        let options = vec![SelectOption::new(1, "Cityville")];
        let raw = widget_value(&options, "1");
        assert_eq!(
            SelectOption::from_widget(&raw).unwrap(),
            Some(SelectOption::new(1, "Cityville"))
        );
        assert_eq!(SelectOption::from_widget(&widget_value(&options, "")).unwrap(), None);
    }
}
