//! Projection of child resources into the App view

use deploycat_model::{App, AppCondition, AppPhase};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::ObjectMeta;

use crate::templates::USER_LABEL;

/// Joins whichever child resources exist into an App view.
///
/// Image and status come from the workload, host from the ingress, port and
/// creation time from the service. A missing child leaves its fields `None`.
#[must_use]
pub fn project(
    name: &str,
    workload: Option<&Deployment>,
    service: Option<&Service>,
    ingress: Option<&Ingress>,
) -> App {
    let user = [
        service.map(|s| &s.metadata),
        workload.map(|w| &w.metadata),
        ingress.map(|i| &i.metadata),
    ]
    .into_iter()
    .flatten()
    .find_map(|meta| meta.labels.as_ref()?.get(USER_LABEL).cloned());

    App {
        name: name.to_string(),
        image: workload.and_then(image),
        host: ingress.and_then(host),
        user,
        port: service.and_then(port),
        status: workload.and_then(condition),
        creation_timestamp: service
            .and_then(|s| s.metadata.creation_timestamp.as_ref())
            .map(|t| t.0.to_rfc3339()),
        phase: phase(workload, service, ingress),
    }
}

fn image(workload: &Deployment) -> Option<String> {
    workload
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .first()?
        .image
        .clone()
}

fn condition(workload: &Deployment) -> Option<AppCondition> {
    let condition = workload.status.as_ref()?.conditions.as_ref()?.first()?;
    Some(AppCondition {
        type_: condition.type_.clone(),
        status: condition.status.clone(),
        reason: condition.reason.clone(),
        message: condition.message.clone(),
    })
}

fn host(ingress: &Ingress) -> Option<String> {
    ingress.spec.as_ref()?.rules.as_ref()?.first()?.host.clone()
}

fn port(service: &Service) -> Option<i32> {
    Some(service.spec.as_ref()?.ports.as_ref()?.first()?.port)
}

fn is_deleting(meta: &ObjectMeta) -> bool {
    meta.deletion_timestamp.is_some()
}

fn is_available(workload: &Deployment) -> bool {
    workload
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Available" && c.status == "True")
        })
}

/// Observed lifecycle derived from which children exist and the workload's conditions
#[must_use]
pub fn phase(
    workload: Option<&Deployment>,
    service: Option<&Service>,
    ingress: Option<&Ingress>,
) -> AppPhase {
    let present = [
        workload.map(|w| &w.metadata),
        service.map(|s| &s.metadata),
        ingress.map(|i| &i.metadata),
    ];

    if present.iter().flatten().any(|meta| is_deleting(meta)) {
        return AppPhase::Deleting;
    }

    match (workload, service, ingress) {
        (None, None, None) => AppPhase::Absent,
        (Some(workload), Some(_), Some(_)) => {
            if is_available(workload) {
                AppPhase::Ready
            } else {
                AppPhase::Pending
            }
        }
        _ => AppPhase::PartiallyCreated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentCondition, DeploymentStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use k8s_openapi::chrono::{TimeZone, Utc};

    use crate::templates;
    use deploycat_model::AppRequest;

    fn request() -> AppRequest {
        AppRequest {
            name: "whoami".into(),
            image: "traefik/whoami".into(),
            host: "whoami.example.com".into(),
            user: "alice".into(),
            port: 80,
        }
    }

    fn available(mut workload: Deployment) -> Deployment {
        workload.status = Some(DeploymentStatus {
            conditions: Some(vec![DeploymentCondition {
                type_: "Available".into(),
                status: "True".into(),
                reason: Some("MinimumReplicasAvailable".into()),
                ..DeploymentCondition::default()
            }]),
            ..DeploymentStatus::default()
        });
        workload
    }

    #[test]
    fn projects_fields_from_each_child() {
        let app = request();
        let workload = available(templates::workload(&app, "apps"));
        let mut service = templates::service(&app, "apps");
        service.metadata.creation_timestamp =
            Some(Time(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()));
        let ingress = templates::ingress(&app, "apps", &crate::CertResolver::default());

        let view = project("whoami", Some(&workload), Some(&service), Some(&ingress));

        assert_eq!(view.image.as_deref(), Some("traefik/whoami"));
        assert_eq!(view.host.as_deref(), Some("whoami.example.com"));
        assert_eq!(view.user.as_deref(), Some("alice"));
        assert_eq!(view.port, Some(80));
        assert_eq!(view.status.unwrap().type_, "Available");
        assert_eq!(
            view.creation_timestamp.as_deref(),
            Some("2026-01-02T03:04:05+00:00")
        );
        assert_eq!(view.phase, AppPhase::Ready);
    }

    #[test]
    fn missing_workload_leaves_its_fields_empty() {
        let app = request();
        let service = templates::service(&app, "apps");
        let ingress = templates::ingress(&app, "apps", &crate::CertResolver::default());

        let view = project("whoami", None, Some(&service), Some(&ingress));

        assert_eq!(view.image, None);
        assert_eq!(view.status, None);
        assert_eq!(view.host.as_deref(), Some("whoami.example.com"));
        assert_eq!(view.phase, AppPhase::PartiallyCreated);
    }

    #[test]
    fn phase_follows_children_and_conditions() {
        let app = request();
        let workload = templates::workload(&app, "apps");
        let service = templates::service(&app, "apps");
        let ingress = templates::ingress(&app, "apps", &crate::CertResolver::default());

        assert_eq!(phase(None, None, None), AppPhase::Absent);
        assert_eq!(
            phase(Some(&workload), Some(&service), Some(&ingress)),
            AppPhase::Pending
        );

        let mut terminating = service.clone();
        terminating.metadata.deletion_timestamp = Some(Time(Utc::now()));
        assert_eq!(
            phase(Some(&workload), Some(&terminating), None),
            AppPhase::Deleting
        );
    }
}
