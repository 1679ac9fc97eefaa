//! Generated Terraform plugin protocol (v6) code
//!
//! The provider speaks protocol v6 over gRPC to Terraform CLI. Terraform
//! launches the provider binary, reads the go-plugin handshake line from
//! stdout, and connects to the advertised address as a gRPC client; the
//! provider is the server.
//!
//! Only the subset of the protocol this provider implements is compiled:
//! schema retrieval, config validation, state upgrade, and the resource
//! lifecycle RPCs. `DynamicValue` payloads are JSON-encoded.

#![allow(missing_docs)] // Generated code doesn't have docs
#![allow(clippy::doc_overindented_list_items)] // Generated proto docs have formatting issues

/// Generated messages and service stubs for protocol v6
pub mod tfplugin6 {
    tonic::include_proto!("tfplugin6");
}
