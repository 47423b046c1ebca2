//! DIDComm protocol services.
pub mod presentproof;
pub mod route;
