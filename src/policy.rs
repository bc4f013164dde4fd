//! Policy Table: the static authorization matrix.
//!
//! Lookups are by exact `(method, route pattern)` where the pattern is the axum
//! route string (`/graduations/{id}`), never the concrete request path. A pair
//! with no entry is denied for every role.

use std::collections::{BTreeSet, HashMap};

use axum::http::Method;
use thiserror::Error;

use crate::models::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Denial {
    #[error("no policy entry for {method} {route}")]
    PolicyUndefined { method: Method, route: String },

    #[error("role '{role}' may not call {method} {route}")]
    InsufficientRole {
        role: Role,
        method: Method,
        route: String,
    },
}

/// PolicyTable
///
/// Immutable once built. Shared through the application state behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    entries: HashMap<(Method, String), BTreeSet<Role>>,
}

impl PolicyTable {
    /// An empty table: denies everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the entry for `method route`.
    pub fn allow(mut self, method: Method, route: &str, roles: &[Role]) -> Self {
        self.entries
            .insert((method, route.to_string()), roles.iter().copied().collect());
        self
    }

    /// The portal's access matrix.
    pub fn reference() -> Self {
        use Role::{Admin, Student, Teacher};

        Self::new()
            .allow(Method::GET, "/me", &[Student, Teacher, Admin])
            .allow(Method::PUT, "/me/password", &[Student, Teacher, Admin])
            .allow(Method::POST, "/admin/password-reset", &[Admin])
            .allow(Method::POST, "/admin/accounts", &[Admin])
            .allow(Method::POST, "/graduations", &[Student])
            .allow(Method::GET, "/graduations", &[Teacher, Admin])
            .allow(Method::GET, "/graduations/{id}", &[Student, Teacher, Admin])
            .allow(Method::PUT, "/graduations/{id}", &[Admin])
            .allow(Method::POST, "/registrations", &[Student, Admin])
            .allow(Method::GET, "/students/{id}/enrollments", &[Student, Teacher, Admin])
            .allow(Method::POST, "/reports", &[Student])
            .allow(Method::GET, "/reports", &[Teacher, Admin])
    }

    pub fn authorize(&self, role: Role, method: &Method, route: &str) -> Result<(), Denial> {
        let permitted = self
            .entries
            .get(&(method.clone(), route.to_string()))
            .ok_or_else(|| Denial::PolicyUndefined {
                method: method.clone(),
                route: route.to_string(),
            })?;

        if permitted.contains(&role) {
            Ok(())
        } else {
            Err(Denial::InsufficientRole {
                role,
                method: method.clone(),
                route: route.to_string(),
            })
        }
    }

    pub fn permitted_roles(&self, method: &Method, route: &str) -> Option<&BTreeSet<Role>> {
        self.entries.get(&(method.clone(), route.to_string()))
    }

    /// Every `(method, route, roles)` entry, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&Method, &str, &BTreeSet<Role>)> {
        self.entries
            .iter()
            .map(|((method, route), roles)| (method, route.as_str(), roles))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Routes from `routes` that have no entry. Used at startup to refuse to serve
    /// protected routes nobody wrote a policy for.
    pub fn missing_entries<'a, I>(&self, routes: I) -> Vec<(Method, String)>
    where
        I: IntoIterator<Item = (&'a Method, &'a str)>,
    {
        routes
            .into_iter()
            .filter(|(method, route)| self.permitted_roles(method, route).is_none())
            .map(|(method, route)| (method.clone(), route.to_string()))
            .collect()
    }
}
