//! CAN Bus Simulation Library
//!
//! This crate provides a simulated bus for running the transmission
//! scheduler without hardware:
//!
//! - **VirtualBus**: records and republishes every frame, can be closed or
//!   told to fail, and tracks how many sends overlap
//!
//! # Example
//!
//! ```rust
//! use can_frame::Frame;
//! use can_sched::BusSink;
//! use can_sim::VirtualBus;
//!
//! # tokio_test_block_on(async {
//! let bus = VirtualBus::new("vcan0");
//! bus.send(&Frame::new(0x64, &[1, 2]).unwrap()).await.unwrap();
//! assert_eq!(bus.frame_count(), 1);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod bus;

pub use bus::{SentFrame, VirtualBus};
