// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles for the msgkeep workspace: a scripted transport and an
//! in-memory remote store with failure injection.

pub mod client;
pub mod remote;

pub use client::ScriptedClient;
pub use remote::MemoryRemote;
