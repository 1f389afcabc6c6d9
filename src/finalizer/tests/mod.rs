//! Test modules for the finalizer component
//!
//! Organized by functional area: registration bookkeeping, drain execution
//! and the rendezvous handshake as seen through a full drain.
