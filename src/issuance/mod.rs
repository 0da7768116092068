//! ACME v1 issuance: authorization, http-01 validation and certificate
//! retrieval, each a small state machine over a [`transport::Transport`].

pub mod authorization;
pub mod certificate;
pub mod challenge;
pub mod client;
pub mod error;
pub mod http;
pub mod jws;
pub mod key_authorization;
pub mod keys;
pub mod observer;
pub mod poll;
pub mod transport;
