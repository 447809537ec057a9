//! Role → connection registry

use dashmap::DashMap;
use tracing::{debug, info};

use crate::protocol::{ConnectionId, Role};

/// In-memory map from a role name to the single live connection that
/// answers for it.
///
/// Shared by every connection task. Each role entry is guarded by its shard
/// lock, so a lookup never observes a half-written mapping.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: DashMap<Role, ConnectionId>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
        }
    }

    /// Map `role` to `connection`, replacing any previous mapping.
    ///
    /// Returns the connection that previously held the role, if it was a
    /// different one. That connection keeps its socket but can no longer be
    /// reached through routing.
    pub fn register(&self, role: Role, connection: ConnectionId) -> Option<ConnectionId> {
        let previous = self.devices.insert(role.clone(), connection);
        match previous {
            Some(old) if old != connection => {
                info!(role = %role, connection = %connection, orphaned = %old, "Role re-registered");
                Some(old)
            }
            Some(_) => {
                debug!(role = %role, connection = %connection, "Role registration refreshed");
                None
            }
            None => {
                info!(role = %role, connection = %connection, "Role registered");
                None
            }
        }
    }

    /// Remove every role currently mapped to `connection`.
    ///
    /// Returns the removed roles (normally exactly one).
    pub fn unregister(&self, connection: ConnectionId) -> Vec<Role> {
        let mut removed = Vec::new();
        self.devices.retain(|role, mapped| {
            if *mapped == connection {
                removed.push(role.clone());
                false
            } else {
                true
            }
        });

        for role in &removed {
            info!(role = %role, connection = %connection, "Role removed from registry");
        }
        removed
    }

    /// Connection currently registered for `role`
    pub fn lookup(&self, role: &str) -> Option<ConnectionId> {
        self.devices.get(role).map(|entry| *entry.value())
    }

    /// Registered roles other than `gatekeeper`, sorted by name
    pub fn roster(&self, gatekeeper: &Role) -> Vec<Role> {
        let mut roles: Vec<Role> = self
            .devices
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|role| role != gatekeeper)
            .collect();
        roles.sort();
        roles
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn latest_registration_wins() {
        let registry = DeviceRegistry::new();
        let first = ConnectionId::new();
        let second = ConnectionId::new();

        assert_eq!(registry.register(Role::from("Soporte"), first), None);
        assert_eq!(registry.register(Role::from("Soporte"), second), Some(first));

        assert_eq!(registry.lookup("Soporte"), Some(second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn re_registering_same_connection_is_not_an_orphan() {
        let registry = DeviceRegistry::new();
        let conn = ConnectionId::new();
        registry.register(Role::from("Soporte"), conn);
        assert_eq!(registry.register(Role::from("Soporte"), conn), None);
    }

    #[test]
    fn unregister_removes_every_role_of_the_connection() {
        let registry = DeviceRegistry::new();
        let conn = ConnectionId::new();
        let other = ConnectionId::new();
        registry.register(Role::from("Sistemas"), conn);
        registry.register(Role::from("Soporte"), conn);
        registry.register(Role::from("Portero"), other);

        let mut removed = registry.unregister(conn);
        removed.sort();
        assert_eq!(removed, vec![Role::from("Sistemas"), Role::from("Soporte")]);
        assert_eq!(registry.lookup("Soporte"), None);
        assert_eq!(registry.lookup("Portero"), Some(other));
    }

    #[test]
    fn unregister_of_orphaned_connection_keeps_new_owner() {
        let registry = DeviceRegistry::new();
        let old = ConnectionId::new();
        let new = ConnectionId::new();
        registry.register(Role::from("Soporte"), old);
        registry.register(Role::from("Soporte"), new);

        assert!(registry.unregister(old).is_empty());
        assert_eq!(registry.lookup("Soporte"), Some(new));
    }

    #[test]
    fn roster_excludes_gatekeeper() {
        let registry = DeviceRegistry::new();
        registry.register(Role::from("Portero"), ConnectionId::new());
        registry.register(Role::from("Soporte"), ConnectionId::new());
        registry.register(Role::from("Contabilidad"), ConnectionId::new());

        assert_eq!(
            registry.roster(&Role::from("Portero")),
            vec![Role::from("Contabilidad"), Role::from("Soporte")]
        );
    }

    #[test]
    fn concurrent_registrations_leave_one_owner_per_role() {
        let registry = Arc::new(DeviceRegistry::new());
        let connections: Vec<ConnectionId> = (0..16).map(|_| ConnectionId::new()).collect();

        let handles: Vec<_> = connections
            .iter()
            .copied()
            .map(|conn| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        registry.register(Role::from("Soporte"), conn);
                        assert!(registry.lookup("Soporte").is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let owner = registry.lookup("Soporte").unwrap();
        assert!(connections.contains(&owner));
        assert_eq!(registry.len(), 1);
    }
}
