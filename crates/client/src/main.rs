//! Relieflink Client - Main entry point
//!
//! Supports both web (WASM) and desktop platforms.

#![allow(non_snake_case)]

use dioxus::prelude::*;
use relieflink_client::{logging, notify::ToastHost, routes::Route, ClientProvider};

fn main() {
    logging::init("relieflink_client=debug");
    dioxus::launch(App);
}

#[component]
fn App() -> Element {
    rsx! {
        ClientProvider {
            ToastHost {}
            Router::<Route> {}
        }
    }
}
