// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! Router operations

use serde::Serialize;
use std::sync::Arc;

use super::{Orchestrator, TargetResult};
use crate::connector::{RouterBackend, RouterRecord};
use crate::error::{BackendError, ErrorBody};

/// Records returned by one menu path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterData {
    pub data: Vec<RouterRecord>,
}

pub type RouterEntry = TargetResult<RouterData>;

#[derive(Debug, Clone, Serialize)]
pub struct InterfacesReport {
    pub router: String,
    pub description: String,
    pub interfaces: RouterEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourcesReport {
    pub router: String,
    pub resources: RouterEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct DhcpLeasesReport {
    pub router: String,
    pub dhcp_leases: RouterEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrafficReport {
    pub router: String,
    pub interfaces: RouterEntry,
    pub bonding: RouterEntry,
}

impl Orchestrator {
    fn router_backend(&self) -> Result<(&Arc<dyn RouterBackend>, String), ErrorBody> {
        match (&self.router, self.config.router()) {
            (Some(backend), Some(cfg)) => Ok((backend, cfg.model.clone())),
            _ => Err(BackendError::NotFound("MikroTik not enabled in config".into()).into()),
        }
    }

    async fn router_entry(backend: &Arc<dyn RouterBackend>, path: &str) -> RouterEntry {
        backend
            .query(path)
            .await
            .map(|data| RouterData { data })
            .into()
    }

    pub async fn router_interfaces(&self) -> Result<InterfacesReport, ErrorBody> {
        let (backend, router) = self.router_backend()?;
        let description = self
            .config
            .router()
            .map(|r| r.description.clone())
            .unwrap_or_default();
        Ok(InterfacesReport {
            router,
            description,
            interfaces: Self::router_entry(backend, "interface").await,
        })
    }

    pub async fn router_resources(&self) -> Result<ResourcesReport, ErrorBody> {
        let (backend, router) = self.router_backend()?;
        Ok(ResourcesReport {
            router,
            resources: Self::router_entry(backend, "system/resource").await,
        })
    }

    pub async fn router_dhcp_leases(&self) -> Result<DhcpLeasesReport, ErrorBody> {
        let (backend, router) = self.router_backend()?;
        Ok(DhcpLeasesReport {
            router,
            dhcp_leases: Self::router_entry(backend, "ip/dhcp-server/lease").await,
        })
    }

    /// Interfaces and bonding fetched together
    pub async fn router_traffic(&self) -> Result<TrafficReport, ErrorBody> {
        let (backend, router) = self.router_backend()?;
        let (interfaces, bonding) = tokio::join!(
            Self::router_entry(backend, "interface"),
            Self::router_entry(backend, "interface/bonding"),
        );
        Ok(TrafficReport {
            router,
            interfaces,
            bonding,
        })
    }
}
