use dioxus::prelude::*;

use crate::hooks::use_connection_state;
use crate::Route;

/// Page chrome shared by every route.
#[component]
pub fn AppLayout() -> Element {
    let connection = use_connection_state();
    let (dot, title) = if connection.is_connected() {
        ("bg-green-500", "Live updates on")
    } else if connection.is_connecting() {
        ("bg-yellow-400", "Connecting...")
    } else {
        ("bg-gray-400", "Live updates off")
    };

    rsx! {
        div { class: "min-h-screen bg-gray-50 text-gray-900",
            nav { class: "flex items-center justify-between bg-blue-700 px-6 py-3 text-white",
                Link { class: "text-lg font-bold", to: Route::Home {}, "Relieflink" }
                div { class: "flex items-center gap-4 text-sm",
                    Link { to: Route::CreateRequest {}, "Add request" }
                    span { class: "inline-block h-2 w-2 rounded-full {dot}", title: "{title}" }
                }
            }
            Outlet::<Route> {}
        }
    }
}
