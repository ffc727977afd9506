//! Role implications
//!
//! Some roles imply aspects of a machine that must exist at creation time,
//! e.g. the `ssh` role implying a security group that opens port 22. A
//! procedure registered for a role runs against the entity every time that
//! role is added to its run list.

use crate::scope::ComputeScope;
use clusterdef_types::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Side-effect procedure attached to a role
pub type ImplicationFn = dyn Fn(&mut ComputeScope<'_>) -> Result<()> + Send + Sync;

/// Role name to procedure map, shared by every cluster of an engine
#[derive(Default)]
pub struct RoleImplications {
    procedures: RwLock<HashMap<String, Arc<ImplicationFn>>>,
}

impl RoleImplications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the implications every deployment expects
    pub fn standard() -> Self {
        let implications = Self::new();
        implications.register("ssh", |scope| {
            scope.cloud(|cloud| {
                cloud
                    .security_group("ssh")
                    .describe("ssh access")
                    .authorize_port_range(22, 22);
            })?;
            Ok(())
        });
        implications
    }

    /// Attach `procedure` to `role`, replacing any earlier registration
    pub fn register<F>(&self, role: impl Into<String>, procedure: F)
    where
        F: Fn(&mut ComputeScope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let role = role.into();
        let replaced = self
            .procedures
            .write()
            .insert(role.clone(), Arc::new(procedure))
            .is_some();
        debug!(%role, replaced, "Registered role implication");
    }

    pub fn contains(&self, role: &str) -> bool {
        self.procedures.read().contains_key(role)
    }

    /// Registered role names, sorted
    pub fn roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.procedures.read().keys().cloned().collect();
        roles.sort();
        roles
    }

    /// Run the procedure registered for `role` against `scope`, if any.
    ///
    /// The registry lock is released before the procedure runs, so a
    /// procedure may add further roles.
    pub fn apply(&self, scope: &mut ComputeScope<'_>, role: &str) -> Result<()> {
        let procedure = self.procedures.read().get(role).cloned();
        match procedure {
            Some(procedure) => {
                trace!(role, node = %scope.node(), "Applying role implication");
                procedure(scope)
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for RoleImplications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleImplications")
            .field("roles", &self.roles())
            .finish()
    }
}
