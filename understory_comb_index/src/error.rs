// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported by registry and index operations.

use core::fmt;

use crate::types::{InstanceId, Name};

/// Errors from [`Registry`](crate::Registry) and [`CombIndex`](crate::CombIndex) operations.
///
/// Every error is returned before any state is changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexError {
    /// The exact relationship tuple is already present.
    DuplicateRelationship {
        /// Parent comb, `None` for top-level.
        parent: Option<Name>,
        /// Child name.
        child: Name,
    },
    /// The id is stale or was never issued.
    UnknownInstance(InstanceId),
    /// Names must be non-empty.
    InvalidName,
    /// Insertion position is past the end of the bucket.
    PositionOutOfRange {
        /// Requested position.
        position: usize,
        /// Current bucket length.
        len: usize,
    },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRelationship { parent, child } => match parent {
                Some(parent) => write!(f, "relationship already indexed: {parent} -> {child}"),
                None => write!(f, "top-level instance already indexed: {child}"),
            },
            Self::UnknownInstance(id) => {
                write!(f, "unknown instance: slot {} generation {}", id.0, id.1)
            }
            Self::InvalidName => write!(f, "directory names must not be empty"),
            Self::PositionOutOfRange { position, len } => {
                write!(f, "position {position} out of range for bucket of {len}")
            }
        }
    }
}

impl core::error::Error for IndexError {}
