// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archive side of msgkeep: day-partition rotation, SFTP shipping, and
//! the cron scheduler that drives both.

pub mod rotation;
pub mod scheduler;
pub mod sftp;

pub use rotation::{RotationManager, SealedPartition, LOG_FILE_PREFIX};
pub use scheduler::ScheduledJob;
pub use sftp::SftpStore;
