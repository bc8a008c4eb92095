use dioxus::prelude::*;
use relieflink_shared::need_added;
use serde_json::Value;

use crate::components::AreaSelection;
use crate::hooks::use_subscription;
use crate::Route;

#[component]
pub fn Home() -> Element {
    rsx! {
        div { class: "px-4",
            header { class: "py-10 text-center",
                h1 { class: "text-3xl font-bold", "Find and share relief requests" }
                p { class: "mt-2 text-gray-600", "Pick your area to see who needs help nearby." }
                Link {
                    class: "mt-4 inline-block rounded bg-blue-600 px-4 py-2 font-semibold text-white",
                    to: Route::CreateRequest {},
                    "Make a request"
                }
            }
            AreaSelection {}
            RecentNeeds {}
        }
    }
}

/// One row of the live feed.
#[derive(Debug, Clone, PartialEq)]
struct NeedRow {
    id: i64,
    contact: String,
    people: i64,
    city: String,
}

fn need_rows(data: Option<&Value>) -> Vec<NeedRow> {
    let Some(rows) = data.and_then(|d| d.get("need")).and_then(Value::as_array) else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| {
            Some(NeedRow {
                id: row.get("id")?.as_i64()?,
                contact: row.get("contactPersonName")?.as_str()?.to_string(),
                people: row.get("numberOfPeople").and_then(Value::as_i64).unwrap_or(0),
                city: row
                    .pointer("/city/name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

/// Requests pushed by the server as they are added.
#[component]
fn RecentNeeds() -> Element {
    let feed = use_subscription(need_added());
    let snapshot = feed.read();
    let rows = need_rows(snapshot.data.as_ref());

    rsx! {
        section { class: "mx-auto max-w-xl pb-10",
            h2 { class: "mb-3 text-lg font-semibold", "Latest requests" }
            if snapshot.loading && rows.is_empty() {
                p { class: "text-sm text-gray-500", "Waiting for updates..." }
            }
            if let Some(error) = &snapshot.error {
                p { class: "text-sm text-red-600", "Live updates interrupted: {error}" }
            }
            ul { class: "divide-y rounded bg-white shadow",
                for row in rows {
                    li { key: "{row.id}", class: "flex justify-between px-4 py-2 text-sm",
                        span { "{row.contact}" }
                        span { class: "text-gray-500", "{row.people} people · {row.city}" }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn feed_rows_skip_malformed_entries() {
        let data = json!({ "need": [
            { "id": 1, "contactPersonName": "Nimal", "numberOfPeople": 4, "city": { "name": "Cityville" } },
            { "contactPersonName": "no id" },
        ]});
        assert_eq!(
            need_rows(Some(&data)),
            vec![NeedRow { id: 1, contact: "Nimal".into(), people: 4, city: "Cityville".into() }]
        );
        assert!(need_rows(None).is_empty());
    }
}
