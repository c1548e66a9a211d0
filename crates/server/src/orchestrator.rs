// Copyright 2026 Deploycat Maintainers
// SPDX-License-Identifier: Apache-2.0

//! App lifecycle on top of a [`Cluster`].
//!
//! Create is strictly ordered (workload, service, ingress) and undoes its own
//! work when a later step fails. Delete and the read joins fan out
//! concurrently. Nothing is stored here, the cluster is the source of truth.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use deploycat_model::{App, AppRequest};
use futures::{join, try_join};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tracing::{Span, debug, error, field, info, instrument, warn};

use crate::certs::CertResolver;
use crate::cluster::{Cluster, ResourceStore};
use crate::{Error, Result, telemetry, templates, view};

/// Child resource kinds of an App
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildKind {
    /// The deployment running the image
    Workload,
    /// The cluster internal service
    Service,
    /// The externally routed ingress
    Ingress,
}

impl ChildKind {
    /// Every kind, in creation order
    pub const ALL: [ChildKind; 3] = [ChildKind::Workload, ChildKind::Service, ChildKind::Ingress];

    /// Kubernetes kind name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChildKind::Workload => "Deployment",
            ChildKind::Service => "Service",
            ChildKind::Ingress => "Ingress",
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creates, reads, lists and deletes Apps as a unit of three child resources
pub struct Orchestrator<C> {
    cluster: C,
    certs: Arc<CertResolver>,
}

impl<C: Cluster> Orchestrator<C> {
    /// Builds an orchestrator over `cluster`, resolving TLS with `certs`
    pub fn new(cluster: C, certs: Arc<CertResolver>) -> Self {
        Self { cluster, certs }
    }

    /// The underlying cluster handle
    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    /// Creates the workload, then the service, then the ingress of an
    /// already validated request.
    ///
    /// # Errors
    /// Returns the cluster error of the first step that failed. When the
    /// workload or service had already been created, they are deleted before
    /// returning and the error is wrapped in [`Error::PartialFailure`].
    #[instrument(skip(self, app), fields(
        app_name = %app.name,
        app_user = %app.user,
        namespace = %self.cluster.namespace(),
        trace_id = field::Empty,
    ))]
    pub async fn create(&self, app: &AppRequest) -> Result<App> {
        telemetry::record_trace_id();
        let namespace = self.cluster.namespace();
        info!("creating app");

        let workload =
            ResourceStore::<Deployment>::create(&self.cluster, &templates::workload(app, namespace))
                .await?;
        debug!("workload created");

        let service =
            match ResourceStore::<Service>::create(&self.cluster, &templates::service(app, namespace))
                .await
            {
                Ok(service) => service,
                Err(err) => {
                    return Err(self
                        .roll_back(&app.name, &[ChildKind::Workload], ChildKind::Service, err)
                        .await);
                }
            };
        debug!("service created");

        let ingress = match ResourceStore::<Ingress>::create(
            &self.cluster,
            &templates::ingress(app, namespace, &self.certs),
        )
        .await
        {
            Ok(ingress) => ingress,
            Err(err) => {
                return Err(self
                    .roll_back(
                        &app.name,
                        &[ChildKind::Workload, ChildKind::Service],
                        ChildKind::Ingress,
                        err,
                    )
                    .await);
            }
        };

        info!("app created");
        Ok(view::project(
            &app.name,
            Some(&workload),
            Some(&service),
            Some(&ingress),
        ))
    }

    /// Compensates a failed create. The original failure stays authoritative,
    /// failures of the compensation itself are only logged. Children that
    /// existed before this create are left in place.
    async fn roll_back(
        &self,
        name: &str,
        created: &[ChildKind],
        stage: ChildKind,
        err: Error,
    ) -> Error {
        error!(error = %err, failed_stage = %stage, "app creation failed, rolling back");
        self.delete_settle_all(name, created).await;
        Error::PartialFailure {
            stage: stage.as_str(),
            source: Box::new(err),
        }
    }

    /// Deletes the ingress, service and workload of `name` concurrently.
    ///
    /// Never fails: children that are already gone or refuse deletion are
    /// logged, so the call is safe on partially created or deleted Apps.
    #[instrument(skip(self), fields(
        app_name = %name,
        namespace = %self.cluster.namespace(),
        trace_id = field::Empty,
    ))]
    pub async fn delete(&self, name: &str) {
        telemetry::record_trace_id();
        self.delete_settle_all(name, &ChildKind::ALL).await;
        info!("app deleted");
    }

    /// Settle-all deletion: waits for every selected child's outcome and
    /// discards the failures.
    async fn delete_settle_all(&self, name: &str, kinds: &[ChildKind]) {
        let selected = |kind| kinds.contains(&kind);

        let ingress = async {
            if selected(ChildKind::Ingress) {
                Some(ResourceStore::<Ingress>::delete(&self.cluster, name).await)
            } else {
                None
            }
        };
        let service = async {
            if selected(ChildKind::Service) {
                Some(ResourceStore::<Service>::delete(&self.cluster, name).await)
            } else {
                None
            }
        };
        let workload = async {
            if selected(ChildKind::Workload) {
                Some(ResourceStore::<Deployment>::delete(&self.cluster, name).await)
            } else {
                None
            }
        };

        let (ingress, service, workload) = join!(ingress, service, workload);

        for (kind, outcome) in [
            (ChildKind::Ingress, ingress),
            (ChildKind::Service, service),
            (ChildKind::Workload, workload),
        ] {
            match outcome {
                Some(Err(err)) if err.is_not_found() => {
                    warn!(child_kind = %kind, "child resource already absent");
                }
                Some(Err(err)) => {
                    warn!(child_kind = %kind, error = %err, "failed to delete child resource");
                }
                Some(Ok(())) => debug!(child_kind = %kind, "child resource deleted"),
                None => {}
            }
        }
    }

    /// Reads the App `name`, requiring all three children to exist.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if any child is missing, even when the
    /// others exist, or the first cluster error of the concurrent reads.
    #[instrument(skip(self), fields(
        app_name = %name,
        namespace = %self.cluster.namespace(),
        trace_id = field::Empty,
    ))]
    pub async fn get(&self, name: &str) -> Result<App> {
        telemetry::record_trace_id();
        let (workload, service, ingress) = try_join!(
            ResourceStore::<Deployment>::get(&self.cluster, name),
            ResourceStore::<Service>::get(&self.cluster, name),
            ResourceStore::<Ingress>::get(&self.cluster, name),
        )?;

        Ok(view::project(
            name,
            Some(&workload),
            Some(&service),
            Some(&ingress),
        ))
    }

    /// Lists the Apps of `user`, one row per service labeled with that user.
    ///
    /// Workload and ingress are joined by name onto each service; a row whose
    /// workload or ingress is missing is kept with those fields left empty.
    ///
    /// # Errors
    /// Returns the first failure of the three concurrent list calls.
    #[instrument(skip(self), fields(
        app_user = %user,
        namespace = %self.cluster.namespace(),
        apps = field::Empty,
        trace_id = field::Empty,
    ))]
    pub async fn list_by_user(&self, user: &str) -> Result<Vec<App>> {
        telemetry::record_trace_id();
        let selector = templates::user_selector(user);
        let (workloads, services, ingresses) = try_join!(
            ResourceStore::<Deployment>::list(&self.cluster, &selector),
            ResourceStore::<Service>::list(&self.cluster, &selector),
            ResourceStore::<Ingress>::list(&self.cluster, &selector),
        )?;

        let workloads: BTreeMap<String, &Deployment> =
            workloads.iter().map(|w| (w.name_any(), w)).collect();
        let ingresses: BTreeMap<String, &Ingress> =
            ingresses.iter().map(|i| (i.name_any(), i)).collect();

        let apps: Vec<App> = services
            .iter()
            .map(|service| {
                let name = service.name_any();
                view::project(
                    &name,
                    workloads.get(&name).copied(),
                    Some(service),
                    ingresses.get(&name).copied(),
                )
            })
            .collect();

        Span::current().record("apps", apps.len());
        debug!("apps listed");
        Ok(apps)
    }
}
