// Configuration
pub mod config;

// Entity model: components, priorities, change kinds
pub mod entity;

// Re-export the core record type for external crates
pub use entity::Entity;

// Planar geometry and WKB codec
pub mod geo;

// Recursive entity filters
pub mod filter;

// Error surface
pub mod error;

// Authorization seam
pub mod auth;

// Append-only timeline sink
pub mod timeline;

// Head state, push pipeline, GC, observation registry
pub mod world;

// Fan-out bus, consumers, sender loop
pub mod bus;

// HTTP and WebSocket APIs
pub mod api;

// World-file persistence
pub mod persist;

// Companion CLI
pub mod cli;
