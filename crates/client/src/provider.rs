//! Makes the single [`Client`] available to the component tree.

use dioxus::core::spawn_forever;
use dioxus::prelude::*;

use crate::client::Client;
use crate::config::ClientConfig;
use crate::runtime::Spawner;

/// Builds the client from the environment, provides it as context and shuts
/// it down when unmounted. Invalid configuration renders a banner instead of
/// the children.
#[component]
pub fn ClientProvider(children: Element) -> Element {
    let (client, config_error) = use_hook(|| {
        // Client tasks outlive the component that started them.
        let spawner = Spawner::new(|fut| {
            spawn_forever(fut);
        });
        match ClientConfig::from_env() {
            Ok(config) => (Client::builder_for(&config).spawner(spawner).build(), None),
            Err(error) => {
                crate::log_error!("Invalid client configuration: {}", error);
                // Without channels every operation fails with a config error.
                (Client::builder().spawner(spawner).build(), Some(error.to_string()))
            }
        }
    });

    use_context_provider(|| client.clone());
    use_drop(move || client.shutdown());

    match config_error {
        None => rsx! { {children} },
        Some(error) => rsx! {
            div { class: "m-8 rounded-lg bg-red-100 p-6 text-red-900",
                h2 { class: "mb-2 text-lg font-bold", "The app is not configured" }
                p { "{error}" }
            }
        },
    }
}

/// The client provided by the nearest [`ClientProvider`].
pub fn use_client() -> Client {
    use_context::<Client>()
}
