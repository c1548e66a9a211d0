//! Declarative shapes of an App's child resources.
//!
//! Every builder is pure: the same request, namespace and certificate rules
//! always produce the same object, so a create can be retried safely.

use std::collections::BTreeMap;

use deploycat_model::AppRequest;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, ResourceRequirements, Service,
    ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;

use crate::certs::CertResolver;

/// Label carrying the App name, also the join key between child resources
pub const NAME_LABEL: &str = "name";
/// Label carrying the public hostname
pub const HOST_LABEL: &str = "host";
/// Label carrying the owner, used by list-by-user queries
pub const USER_LABEL: &str = "user";

const PORT_NAME: &str = "http";

/// Labels shared by all three child resources
#[must_use]
pub fn labels(app: &AppRequest) -> BTreeMap<String, String> {
    BTreeMap::from([
        (NAME_LABEL.to_string(), app.name.clone()),
        (HOST_LABEL.to_string(), app.host.clone()),
        (USER_LABEL.to_string(), app.user.clone()),
    ])
}

/// Label selector matching every child resource owned by `user`
#[must_use]
pub fn user_selector(user: &str) -> String {
    format!("{USER_LABEL}={user}")
}

/// Fallback TLS secret of an App whose host matches no certificate rule
#[must_use]
pub fn fallback_secret_name(app_name: &str) -> String {
    format!("{app_name}-cert")
}

fn metadata(app: &AppRequest, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(app.name.clone()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels(app)),
        ..ObjectMeta::default()
    }
}

fn quantities(cpu: &str, memory: &str) -> BTreeMap<String, Quantity> {
    BTreeMap::from([
        ("cpu".to_string(), Quantity(cpu.to_string())),
        ("memory".to_string(), Quantity(memory.to_string())),
    ])
}

/// Single replica deployment running the App image
#[must_use]
pub fn workload(app: &AppRequest, namespace: &str) -> Deployment {
    let labels = labels(app);

    Deployment {
        metadata: metadata(app, namespace),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: format!("{}-1", app.name),
                        image: Some(app.image.clone()),
                        ports: Some(vec![ContainerPort {
                            container_port: app.port,
                            name: Some(PORT_NAME.to_string()),
                            ..ContainerPort::default()
                        }]),
                        resources: Some(ResourceRequirements {
                            limits: Some(quantities("100m", "100Mi")),
                            requests: Some(quantities("50m", "50Mi")),
                            ..ResourceRequirements::default()
                        }),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

/// Cluster internal service in front of the workload
#[must_use]
pub fn service(app: &AppRequest, namespace: &str) -> Service {
    Service {
        metadata: metadata(app, namespace),
        spec: Some(ServiceSpec {
            selector: Some(BTreeMap::from([(
                NAME_LABEL.to_string(),
                app.name.clone(),
            )])),
            type_: Some("ClusterIP".to_string()),
            ports: Some(vec![ServicePort {
                name: Some(PORT_NAME.to_string()),
                port: app.port,
                target_port: Some(IntOrString::Int(app.port)),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

/// TLS block for `app.host`: the first matching certificate rule, or a
/// per-app secret named after the App
#[must_use]
pub fn tls(app: &AppRequest, certs: &CertResolver) -> IngressTLS {
    let secret_name = match certs.resolve(&app.host) {
        Some(cert) => cert.secret_name.clone(),
        None => Some(fallback_secret_name(&app.name)),
    };

    IngressTLS {
        hosts: Some(vec![app.host.clone()]),
        secret_name,
    }
}

/// Ingress routing every path of `app.host` to the service
#[must_use]
pub fn ingress(app: &AppRequest, namespace: &str, certs: &CertResolver) -> Ingress {
    Ingress {
        metadata: metadata(app, namespace),
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some(app.host.clone()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: app.name.clone(),
                                port: Some(ServiceBackendPort {
                                    number: Some(app.port),
                                    ..ServiceBackendPort::default()
                                }),
                            }),
                            ..IngressBackend::default()
                        },
                    }],
                }),
            }]),
            tls: Some(vec![tls(app, certs)]),
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    }
}
