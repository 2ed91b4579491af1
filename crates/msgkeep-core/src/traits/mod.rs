// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the transport and remote-storage seams.

pub mod client;
pub mod remote;

pub use client::ClientApi;
pub use remote::RemoteStore;
