//! Application routing configuration.

use dioxus::prelude::*;

use crate::views::{AppLayout, CreateRequest, Home, Terms};

#[derive(Debug, Clone, Routable, PartialEq)]
#[rustfmt::skip]
pub enum Route {
    #[layout(AppLayout)]
        #[route("/")]
        Home {},
        #[route("/request/new")]
        CreateRequest {},
        #[route("/terms")]
        Terms {},
}
