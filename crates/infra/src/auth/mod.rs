//! Credential acquisition adapters

mod code_flow;

pub use code_flow::AuthorizationCodeFlow;
