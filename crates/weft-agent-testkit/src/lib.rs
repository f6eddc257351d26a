//! # Weft Agent Testkit
//!
//! Testing utilities for the Weft agent.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an assembled agent over in-memory stores and an
//!   in-memory endpoint network, plus record-authoring helpers
//! - **Generators**: proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! Quickly set up sync scenarios:
//!
//! ```rust
//! use weft_agent_testkit::fixtures::TestFixture;
//!
//! # async fn example() {
//! let fixture = TestFixture::new();
//! let alice = TestFixture::did("alice");
//! let endpoint = TestFixture::endpoint("dwn");
//!
//! let remote = fixture.add_remote(endpoint.clone());
//! fixture.register(&alice, vec![endpoint]).await;
//! fixture.seed(&remote, &alice, b"hello").await;
//!
//! fixture.agent.pull().await.unwrap();
//! # }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use weft_agent_testkit::generators::{message_from_params, MessageParams};
//!
//! proptest! {
//!     #[test]
//!     fn record_id_is_deterministic(params: MessageParams) {
//!         let (m1, _) = message_from_params(&params);
//!         let (m2, _) = message_from_params(&params);
//!         prop_assert_eq!(m1.compute_id(), m2.compute_id());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{MemoryAgent, TestFixture};
pub use generators::{message_from_params, MessageParams};
