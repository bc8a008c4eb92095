use dioxus::prelude::*;

use crate::provider::use_client;
use crate::transport::ConnectionState;

const POLL_INTERVAL_MS: u64 = 1_000;

/// State of the subscription connection, refreshed once a second.
pub fn use_connection_state() -> ConnectionState {
    let client = use_client();
    let mut state = use_signal(|| client.connection_state());

    use_future(move || {
        let client = client.clone();
        async move {
            loop {
                crate::runtime::sleep_ms(POLL_INTERVAL_MS).await;
                let current = client.connection_state();
                if *state.peek() != current {
                    state.set(current);
                }
            }
        }
    });

    state.cloned()
}
