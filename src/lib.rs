//! A socket layer for raw IPv4 datagrams over asynchronous network drivers.
//!
//! This library bridges a BSD-socket style interface (`bind`, `connect`, `send`, `receive`) to an
//! event-driven IPv4 protocol driver that hands out completion events for posted receive and
//! transmit operations. It implements the buffering, queueing and flow control around such a
//! driver; the network protocol itself (routing, fragment reassembly, checksums) remains the
//! driver's job.
//!
//! ## Structure
//!
//! The [`driver`] module defines the contract a protocol driver has to implement and a software
//! stub implementation for testing. The [`sock`] module contains the socket state machine: port
//! binding, the receive engine and the transmit engine. The [`wire`] module holds the few
//! wire-level types needed at this layer (addresses and protocol numbers) and [`storage`] the
//! FIFO queue the engines are built on.
//!
//! ## The receive engine
//!
//! Each port posts a single receive buffer to its driver. When the driver completes it, the
//! borrowed buffer is queued to the socket in FIFO order and another receive is posted, unless
//! the amount of buffered data has reached the socket's high-water mark. Not reposting is the
//! flow control mechanism; the receive is posted again once a `receive` call drains the queue
//! below the mark. The driver's buffer is held until the application consumes the datagram, so
//! no data is copied before the application asks for it.
//!
//! ## The transmit engine
//!
//! Outbound datagrams are copied into locally owned buffers, queued per socket and pumped onto a
//! fixed set of per-port transmit slots. Completions free the slot and start the next queued
//! datagram. Transmit errors are latched and surface on the *next* send attempt, never
//! synchronously with the completion that failed.
//!
//! ## Execution model
//!
//! Everything runs single-threaded and cooperatively: completion events are drained by calling
//! [`sock::Socket::poll`], and every state mutation goes through `&mut Socket`. The exclusive
//! borrow is the only mutual exclusion this crate needs; wrap the socket in a lock of your choice
//! if you share it between threads.
//!
//! [`driver`]: driver/index.html
//! [`sock`]: sock/index.html
//! [`wire`]: wire/index.html
//! [`storage`]: storage/index.html
//! [`sock::Socket::poll`]: sock/struct.Socket.html#method.poll
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

extern crate alloc;

#[macro_use] mod macros;
pub mod driver;
pub mod sock;
pub mod storage;
pub mod wire;
