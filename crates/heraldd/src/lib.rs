//! herald daemon - subscriber registry and notification routing
//!
//! This crate provides the core infrastructure for the herald daemon:
//! - `registry` - Subscriber registry: tokens, connections, read loops
//! - `server` - TCP subscription listener and HTTP control endpoint
//! - `shutdown` - Signal handling and drain-on-exit
//! - `config` - Layered configuration (defaults, TOML, environment)
//! - `daemon` - Wiring of the above into one running process
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       heraldd daemon                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ SubscriptionSrv │────▶│     SubscriberRegistry      │   │
//! │  │   (TCP :3000)   │     │  (connection state owner)   │   │
//! │  └─────────────────┘     └──────────────┬──────────────┘   │
//! │                                 ▲       │                   │
//! │  ┌─────────────────┐            │       │ spawn             │
//! │  │  ControlServer  │────────────┘       ▼                   │
//! │  │  (HTTP :4000)   │         ┌─────────────────────────┐   │
//! │  └─────────────────┘         │  read loop (per token)  │   │
//! │                              └─────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - I/O failures on one subscriber never affect another

pub mod config;
pub mod daemon;
pub mod registry;
pub mod server;
pub mod shutdown;
