// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Persistence of in-flight Azure long-running operations.
//!
//! A reconcile tick is short; an Azure operation can take minutes. When a tick
//! runs out of time the operation's resume token is stored as a [`Future`] on the
//! owning object's status, and the next tick resumes polling from it.

use crate::azure_errors::ReconcileError;
use crate::crd::{Future, FutureType};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Builds a [`Future`] from a resume token.
#[must_use]
pub fn resume_token_to_future(
    future_type: FutureType,
    service_name: &str,
    name: &str,
    resource_group: &str,
    resume_token: &str,
) -> Future {
    Future {
        r#type: future_type,
        service_name: service_name.to_string(),
        name: name.to_string(),
        resource_group: resource_group.to_string(),
        data: STANDARD.encode(resume_token.as_bytes()),
    }
}

/// Recovers the resume token stored in a [`Future`].
///
/// # Errors
///
/// Returns a transient error if `data` is not valid base64 or not UTF-8. The caller
/// is expected to drop the future and start over.
pub fn future_to_resume_token(future: &Future) -> Result<String, ReconcileError> {
    let bytes = STANDARD.decode(future.data.as_bytes()).map_err(|e| {
        ReconcileError::transient(format!(
            "failed to decode future data for {}/{}: {e}",
            future.resource_group, future.name
        ))
    })?;
    String::from_utf8(bytes).map_err(|e| {
        ReconcileError::transient(format!(
            "future data for {}/{} is not a valid resume token: {e}",
            future.resource_group, future.name
        ))
    })
}

/// Ordered list of futures as persisted in `status.longRunningOperationStates`.
///
/// Holds at most one future per `(service_name, name, type)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FutureStore {
    futures: Vec<Future>,
}

impl FutureStore {
    #[must_use]
    pub fn new(futures: Vec<Future>) -> Self {
        Self { futures }
    }

    #[must_use]
    pub fn get(&self, name: &str, service_name: &str, future_type: FutureType) -> Option<&Future> {
        self.futures.iter().find(|f| matches(f, name, service_name, future_type))
    }

    /// Inserts `future`, replacing an existing one with the same key in place.
    pub fn set(&mut self, future: Future) {
        if let Some(existing) = self
            .futures
            .iter_mut()
            .find(|f| matches(f, &future.name, &future.service_name, future.r#type))
        {
            *existing = future;
        } else {
            self.futures.push(future);
        }
    }

    pub fn delete(&mut self, name: &str, service_name: &str, future_type: FutureType) {
        self.futures
            .retain(|f| !matches(f, name, service_name, future_type));
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Future] {
        &self.futures
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.futures.is_empty()
    }
}

fn matches(future: &Future, name: &str, service_name: &str, future_type: FutureType) -> bool {
    future.name == name && future.service_name == service_name && future.r#type == future_type
}

#[cfg(test)]
#[path = "future_tests.rs"]
mod future_tests;
