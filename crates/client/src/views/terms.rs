use dioxus::prelude::*;

#[component]
pub fn Terms() -> Element {
    rsx! {
        div { class: "mx-auto max-w-2xl p-8",
            h1 { class: "mb-4 text-2xl font-bold", "Terms and conditions" }
            ol { class: "list-decimal space-y-2 pl-6",
                li { "The details you submit are shared publicly so that distributors can reach you." }
                li { "Only make a request if you have no other way to obtain the basics." }
                li { "Requests are fulfilled on a best-effort basis; no delivery is guaranteed." }
                li { "Submitting false information may get your request removed." }
            }
        }
    }
}
