//! In-memory provisioning engine.
//!
//! The engine owns every server record behind a single reader/writer lock.
//! Read operations take the shared side, mutating operations the exclusive
//! side, and each operation holds its guard for the whole
//! lookup-validate-mutate sequence. Values leave the engine as clones.
//!
//! Provisioning actions that a real backend performs asynchronously (OS
//! installation, power transitions) run as background tasks on an
//! [`ActionScheduler`]; those tasks take the exclusive lock like any other
//! mutation.

mod actions;
mod ids;
mod ports;

use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info, warn};

pub use actions::ActionScheduler;
pub use ids::IdAllocator;

use crate::error::{EngineError, ResourceKind, SeedError};
use crate::models::{
    DedicatedSubnet, InterfacePort, ListServersParams, OsImage, OsInstallParameter, PaginateMeta,
    PortChannel, PortChannelId, PortId, PowerControlParameter, PrivateNetwork, RaidStatus,
    ReadRaidStatusParams, ServerLockStatus, Server, ServerPowerStatus, Servers,
};
use crate::seed::{Seed, ServerRecord};

/// Read-only reference catalogs consulted during network assignment.
#[derive(Debug, Default)]
pub struct Catalog {
    dedicated_subnets: Vec<DedicatedSubnet>,
    private_networks: Vec<PrivateNetwork>,
}

impl Catalog {
    /// Look up a dedicated subnet.
    #[must_use]
    pub fn dedicated_subnet(&self, id: &str) -> Option<&DedicatedSubnet> {
        self.dedicated_subnets
            .iter()
            .find(|s| s.dedicated_subnet_id == id)
    }

    /// Look up a private network.
    #[must_use]
    pub fn private_network(&self, id: &str) -> Option<&PrivateNetwork> {
        self.private_networks
            .iter()
            .find(|n| n.private_network_id == id)
    }
}

/// Record store guarded by the engine lock.
#[derive(Debug)]
pub struct Store {
    servers: Vec<ServerRecord>,
    catalog: Catalog,
}

impl Store {
    /// Look up a server record.
    ///
    /// # Errors
    /// Returns `NotFound` if no server has this identifier.
    pub fn server(&self, server_id: &str) -> Result<&ServerRecord, EngineError> {
        self.servers
            .iter()
            .find(|r| r.server.server_id == server_id)
            .ok_or_else(|| EngineError::not_found(ResourceKind::Server, server_id))
    }

    /// Look up a server record for mutation.
    ///
    /// # Errors
    /// Returns `NotFound` if no server has this identifier.
    pub(crate) fn server_mut(
        &mut self,
        server_id: &str,
    ) -> Result<&mut ServerRecord, EngineError> {
        record_mut(&mut self.servers, server_id)
    }
}

fn record_mut<'a>(
    servers: &'a mut [ServerRecord],
    server_id: &str,
) -> Result<&'a mut ServerRecord, EngineError> {
    servers
        .iter_mut()
        .find(|r| r.server.server_id == server_id)
        .ok_or_else(|| EngineError::not_found(ResourceKind::Server, server_id))
}

impl ServerRecord {
    fn scope(&self) -> String {
        format!("server[{}]", self.server.server_id)
    }

    /// Look up a port of this server.
    ///
    /// # Errors
    /// Returns `NotFound` if the server has no such port.
    pub fn port(&self, port_id: PortId) -> Result<&InterfacePort, EngineError> {
        self.server
            .ports
            .iter()
            .find(|p| p.port_id == port_id)
            .ok_or_else(|| EngineError::not_found_in(ResourceKind::Port, port_id, self.scope()))
    }

    /// Look up a port of this server for mutation.
    ///
    /// # Errors
    /// Returns `NotFound` if the server has no such port.
    pub fn port_mut(&mut self, port_id: PortId) -> Result<&mut InterfacePort, EngineError> {
        let scope = self.scope();
        self.server
            .ports
            .iter_mut()
            .find(|p| p.port_id == port_id)
            .ok_or_else(|| EngineError::not_found_in(ResourceKind::Port, port_id, scope))
    }

    /// Look up a port channel of this server.
    ///
    /// # Errors
    /// Returns `NotFound` if the server has no such port channel.
    pub fn port_channel(
        &self,
        port_channel_id: PortChannelId,
    ) -> Result<&PortChannel, EngineError> {
        self.server
            .port_channels
            .iter()
            .find(|c| c.port_channel_id == port_channel_id)
            .ok_or_else(|| {
                EngineError::not_found_in(ResourceKind::PortChannel, port_channel_id, self.scope())
            })
    }

    /// Look up a port channel of this server for mutation.
    ///
    /// # Errors
    /// Returns `NotFound` if the server has no such port channel.
    pub fn port_channel_mut(
        &mut self,
        port_channel_id: PortChannelId,
    ) -> Result<&mut PortChannel, EngineError> {
        let scope = self.scope();
        self.server
            .port_channels
            .iter_mut()
            .find(|c| c.port_channel_id == port_channel_id)
            .ok_or_else(|| {
                EngineError::not_found_in(ResourceKind::PortChannel, port_channel_id, scope)
            })
    }

    fn ensure_unlocked(&self) -> Result<(), EngineError> {
        match self.server.lock_status {
            Some(status) => {
                debug!(
                    server_id = %self.server.server_id,
                    lock_status = %status,
                    "Server is locked"
                );
                Err(EngineError::conflict(ResourceKind::Server, &self.server.server_id))
            }
            None => Ok(()),
        }
    }
}

/// Handle to the simulated provisioning backend.
///
/// Cloning the handle shares the same state.
#[derive(Clone)]
pub struct Engine {
    store: Arc<RwLock<Store>>,
    ids: Arc<IdAllocator>,
    actions: ActionScheduler,
}

impl Engine {
    /// Build an engine from seed data.
    ///
    /// # Errors
    /// Returns an error if the seed is inconsistent.
    pub fn new(seed: Seed) -> Result<Self, SeedError> {
        seed.validate()?;

        let ids = IdAllocator::starting_at(seed.max_port_id() + 1);
        info!(
            servers = seed.servers.len(),
            dedicated_subnets = seed.dedicated_subnets.len(),
            private_networks = seed.private_networks.len(),
            "Engine initialized"
        );

        Ok(Self {
            store: Arc::new(RwLock::new(Store {
                servers: seed.servers,
                catalog: Catalog {
                    dedicated_subnets: seed.dedicated_subnets,
                    private_networks: seed.private_networks,
                },
            })),
            ids: Arc::new(ids),
            actions: ActionScheduler::new(),
        })
    }

    /// Acquire shared access to the store. Released when the guard drops.
    ///
    /// The guard owns a handle to the store, so it can be held across tasks
    /// without borrowing the engine.
    pub async fn shared(&self) -> OwnedRwLockReadGuard<Store> {
        Arc::clone(&self.store).read_owned().await
    }

    /// Acquire exclusive access to the store. Released when the guard drops.
    pub(crate) async fn exclusive(&self) -> OwnedRwLockWriteGuard<Store> {
        Arc::clone(&self.store).write_owned().await
    }

    /// Wait until every background action, including follow-up steps they
    /// launch, has finished.
    pub async fn wait_for_actions(&self) {
        self.actions.wait_idle().await;
    }

    /// Number of background actions still running.
    #[must_use]
    pub fn pending_actions(&self) -> usize {
        self.actions.pending()
    }

    // ------------------------------------------------------------------------
    // Servers
    // ------------------------------------------------------------------------

    /// List all servers.
    ///
    /// Pagination and filter parameters are accepted but not applied.
    pub async fn list_servers(&self, _params: &ListServersParams) -> Servers {
        let store = self.shared().await;
        let servers: Vec<Server> = store.servers.iter().map(|r| r.server.clone()).collect();
        Servers {
            meta: PaginateMeta {
                count: servers.len(),
            },
            servers,
        }
    }

    /// Read one server.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown server.
    pub async fn read_server(&self, server_id: &str) -> Result<Server, EngineError> {
        let store = self.shared().await;
        Ok(store.server(server_id)?.server.clone())
    }

    /// List the OS images installable on a server.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown server.
    pub async fn list_os_images(&self, server_id: &str) -> Result<Vec<OsImage>, EngineError> {
        let store = self.shared().await;
        Ok(store.server(server_id)?.os_images.clone())
    }

    /// Start an OS installation.
    ///
    /// The server is marked `os_install` before this returns; a background
    /// action clears the mark once the installation completes.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown server or image, `Conflict` if the
    /// server is already locked.
    pub async fn os_install(
        &self,
        server_id: &str,
        params: &OsInstallParameter,
    ) -> Result<(), EngineError> {
        {
            let mut store = self.exclusive().await;
            let record = store.server_mut(server_id)?;
            record.ensure_unlocked()?;

            if !record
                .os_images
                .iter()
                .any(|image| image.os_image_id == params.os_image_id)
            {
                return Err(EngineError::not_found_in(
                    ResourceKind::OsImage,
                    &params.os_image_id,
                    record.scope(),
                ));
            }

            record.server.lock_status = Some(ServerLockStatus::OsInstall);
        }

        info!(
            server_id = %server_id,
            os_image_id = %params.os_image_id,
            "OS install accepted"
        );
        self.start_os_install(server_id.to_string(), params.os_image_id.clone());
        Ok(())
    }

    /// Request a power operation.
    ///
    /// The power status settles in a background action. Unrecognised
    /// operations are accepted and change nothing.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown server, `Conflict` if the server is
    /// locked.
    pub async fn power_control(
        &self,
        server_id: &str,
        params: &PowerControlParameter,
    ) -> Result<(), EngineError> {
        {
            let store = self.exclusive().await;
            store.server(server_id)?.ensure_unlocked()?;
        }

        let Some(target) = params.operation.target_state() else {
            warn!(
                server_id = %server_id,
                operation = %params.operation,
                "Ignoring unknown power operation"
            );
            return Ok(());
        };

        info!(
            server_id = %server_id,
            operation = %params.operation,
            target = %target,
            "Power control accepted"
        );
        self.start_power_control(server_id.to_string(), target);
        Ok(())
    }

    /// Read the live power status of a server.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown server.
    pub async fn read_power_status(
        &self,
        server_id: &str,
    ) -> Result<ServerPowerStatus, EngineError> {
        let store = self.shared().await;
        Ok(store.server(server_id)?.power_status.clone())
    }

    /// Read the RAID status of a server. `refresh` is ignored.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown server.
    pub async fn read_raid_status(
        &self,
        server_id: &str,
        _params: &ReadRaidStatusParams,
    ) -> Result<RaidStatus, EngineError> {
        let store = self.shared().await;
        Ok(store.server(server_id)?.raid_status.clone())
    }
}
