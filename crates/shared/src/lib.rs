//! pairseal-shared — wire-level types exchanged with the transport layer.
//!
//! The transport moves these payloads opaquely between connected clients;
//! it never sees key material. Binary fields travel base64-encoded, the
//! content digest hex-encoded.

pub mod wire;
