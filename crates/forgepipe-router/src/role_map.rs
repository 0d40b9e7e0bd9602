//! Resolves a role name to a primary `(provider, model)` pair plus an
//! ordered fallback chain, so stage handlers never name a provider directly.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct RoleTarget {
    pub primary: (String, String),
    pub fallback_chain: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct RoleMap {
    roles: HashMap<String, RoleTarget>,
}

impl RoleMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: impl Into<String>, target: RoleTarget) {
        self.roles.insert(role.into(), target);
    }

    #[must_use]
    pub fn get(&self, role: &str) -> Option<&RoleTarget> {
        self.roles.get(role)
    }
}
