//! Kubernetes API server event source.

use futures_util::StreamExt;
use k8s_openapi::api::core::v1::Endpoints;
use kube::api::{Api, DynamicObject, GroupVersionKind};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Client, Config, ResourceExt};

use crate::config::KubernetesConfig;
use crate::informer::source::{EventSource, WatchEvent, WatchStream};
use crate::informer::{InformerError, ResourceKind, ResourceObject};

/// Watches resources through the Kubernetes API.
#[derive(Clone)]
pub struct KubeEventSource {
    client: Client,
}

impl KubeEventSource {
    /// Build a client from the kubeconfig file, or infer one when no path is set.
    pub async fn connect(config: &KubernetesConfig) -> Result<Self, InformerError> {
        let kube_config = if config.kubeconfig.is_empty() {
            Config::infer()
                .await
                .map_err(|e| InformerError::Config(e.to_string()))?
        } else {
            let kubeconfig = Kubeconfig::read_from(&config.kubeconfig)
                .map_err(|e| InformerError::Config(format!("{}: {}", config.kubeconfig, e)))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| InformerError::Config(format!("{}: {}", config.kubeconfig, e)))?
        };

        let client = Client::try_from(kube_config).map_err(InformerError::Client)?;
        let origin = if config.kubeconfig.is_empty() {
            "<inferred>"
        } else {
            config.kubeconfig.as_str()
        };
        tracing::info!(kubeconfig = %origin, "Kubernetes client created");

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn api_resource(kind: ResourceKind) -> ApiResource {
    match kind {
        ResourceKind::Endpoints => ApiResource::erase::<Endpoints>(&()),
        custom => ApiResource::from_gvk_with_plural(
            &GroupVersionKind::gvk(custom.group(), custom.version(), custom.as_str()),
            custom.plural(),
        ),
    }
}

fn to_object(kind: ResourceKind, obj: DynamicObject) -> ResourceObject {
    let data = match serde_json::to_value(&obj) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                kind = %kind,
                name = %obj.name_any(),
                error = %e,
                "Failed to serialize object, caching metadata only"
            );
            serde_json::Value::Null
        }
    };

    ResourceObject {
        kind,
        namespace: obj.namespace(),
        name: obj.name_any(),
        resource_version: obj.resource_version(),
        data,
    }
}

impl EventSource for KubeEventSource {
    fn watch(&self, kind: ResourceKind) -> WatchStream {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &api_resource(kind));

        watcher(api, watcher::Config::default())
            .default_backoff()
            .filter_map(move |event| async move {
                match event {
                    Ok(watcher::Event::Apply(obj)) | Ok(watcher::Event::InitApply(obj)) => {
                        Some(Ok(WatchEvent::Apply(to_object(kind, obj))))
                    }
                    Ok(watcher::Event::Delete(obj)) => {
                        Some(Ok(WatchEvent::Delete(to_object(kind, obj))))
                    }
                    Ok(watcher::Event::InitDone) => Some(Ok(WatchEvent::Synced)),
                    Ok(watcher::Event::Init) => None,
                    Err(e) => Some(Err(InformerError::Watch {
                        kind,
                        message: e.to_string(),
                    })),
                }
            })
            .boxed()
    }
}
