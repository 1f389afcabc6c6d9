pub mod app;
pub mod core;
pub mod finalizer;
pub mod lifecycle;
