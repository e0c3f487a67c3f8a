//! End-to-end tests of the registry client against a mock distribution API

use soci_registry::config::{AuthConfig, ClientConfig, DEFAULT_USER_AGENT};
use soci_registry::image::media_type;
use soci_registry::{
    ContentStore, Descriptor, FsStore, IndexVersion, MemoryStore, RegistryClient, RegistryError, TransferError,
    ValidationError,
};
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REJECTION_BODY: &str = r#"{"errors":[{"code":"UNSUPPORTED","message":"Invalid parameter at 'ImageManifest' failed to satisfy constraint: 'Invalid JSON syntax'"}]}"#;

struct Image {
    config_media_type: String,
    config: Vec<u8>,
    layer: Vec<u8>,
    manifest: Vec<u8>,
}

impl Image {
    fn new(config_media_type: &str) -> Self {
        let config = br#"{"architecture":"amd64","os":"linux"}"#.to_vec();
        let layer = b"layer contents".to_vec();
        let config_desc = Descriptor::for_content(config_media_type, &config);
        let layer_desc = Descriptor::for_content("application/vnd.oci.image.layer.v1.tar+gzip", &layer);
        let manifest = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": media_type::OCI_MANIFEST,
            "config": config_desc,
            "layers": [layer_desc],
        });
        Self {
            config_media_type: config_media_type.to_string(),
            config,
            layer,
            manifest: serde_json::to_vec(&manifest).unwrap(),
        }
    }

    fn config_descriptor(&self) -> Descriptor {
        Descriptor::for_content(self.config_media_type.as_str(), &self.config)
    }

    fn layer_descriptor(&self) -> Descriptor {
        Descriptor::for_content("application/vnd.oci.image.layer.v1.tar+gzip", &self.layer)
    }

    fn root(&self) -> Descriptor {
        Descriptor::for_content(media_type::OCI_MANIFEST, &self.manifest)
    }

    async fn store_in(&self, store: &dyn ContentStore) {
        store.push(&self.config_descriptor(), &self.config).await.unwrap();
        store.push(&self.layer_descriptor(), &self.layer).await.unwrap();
        store.push(&self.root(), &self.manifest).await.unwrap();
    }
}

fn index_body(children: &[Descriptor]) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "schemaVersion": 2,
        "mediaType": media_type::OCI_INDEX,
        "manifests": children,
    }))
    .unwrap()
}

fn manifest_response(body: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Docker-Content-Digest", Descriptor::for_content("", body).digest.to_string())
        .set_body_raw(body.to_vec(), media_type::OCI_MANIFEST)
}

async fn client_for(server: &MockServer) -> RegistryClient {
    RegistryClient::init_with_config(&server.uri(), &ClientConfig::default())
        .await
        .unwrap()
}

/// Mocks for a registry that has nothing yet and accepts blob uploads.
async fn mount_empty_repository(server: &MockServer) {
    Mock::given(method("HEAD"))
        .and(path_regex(r"^/v2/app/(manifests|blobs)/sha256:[0-9a-f]{64}$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/app/blobs/uploads/"))
        .respond_with(ResponseTemplate::new(202).insert_header("Location", "/v2/app/blobs/uploads/session-1"))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v2/app/blobs/uploads/session-1"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(server)
        .await;
}

#[tokio::test]
async fn pull_copies_image_into_fs_store() {
    let server = MockServer::start().await;
    let image = Image::new(media_type::OCI_IMAGE_CONFIG);
    let root = image.root();

    for reference in ["latest".to_string(), root.digest.to_string()] {
        Mock::given(method("HEAD"))
            .and(path(format!("/v2/app/manifests/{}", reference)))
            .respond_with(manifest_response(&image.manifest))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/app/manifests/{}", reference)))
            .respond_with(manifest_response(&image.manifest))
            .mount(&server)
            .await;
    }
    for (descriptor, body) in [
        (image.config_descriptor(), &image.config),
        (image.layer_descriptor(), &image.layer),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/v2/app/blobs/{}", descriptor.digest)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::open(dir.path()).await.unwrap();
    let client = client_for(&server).await;

    let pulled = client.pull("app", &store, "latest").await.unwrap();
    assert_eq!(pulled, root);
    assert_eq!(pulled.media_type, media_type::OCI_MANIFEST);

    assert!(store.exists(&image.config_descriptor()).await.unwrap());
    assert!(store.exists(&image.layer_descriptor()).await.unwrap());
    assert_eq!(store.fetch(&root).await.unwrap(), image.manifest);
    assert_eq!(store.resolve("latest").await.unwrap(), root);

    let reopened = FsStore::open(dir.path()).await.unwrap();
    assert_eq!(reopened.resolve("latest").await.unwrap(), root);
}

#[tokio::test]
async fn push_uploads_graph_and_tags() {
    let server = MockServer::start().await;
    let image = Image::new(media_type::OCI_IMAGE_CONFIG);
    let root = image.root();
    mount_empty_repository(&server).await;

    Mock::given(method("PUT"))
        .and(path(format!("/v2/app/manifests/{}", root.digest)))
        .and(header("content-type", media_type::OCI_MANIFEST))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/app/manifests/{}", root.digest)))
        .respond_with(manifest_response(&image.manifest))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v2/app/manifests/soci-index"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    image.store_in(&store).await;

    let client = client_for(&server).await;
    client.push(&store, &root, "app", "soci-index").await.unwrap();
}

#[tokio::test]
async fn push_reports_unsupported_registry() {
    let server = MockServer::start().await;
    let image = Image::new(media_type::OCI_IMAGE_CONFIG);
    let root = image.root();
    mount_empty_repository(&server).await;

    Mock::given(method("PUT"))
        .and(path(format!("/v2/app/manifests/{}", root.digest)))
        .respond_with(ResponseTemplate::new(405).set_body_raw(REJECTION_BODY, "application/json"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v2/app/manifests/soci-index"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    image.store_in(&store).await;

    let err = client_for(&server)
        .await
        .push(&store, &root, "app", "soci-index")
        .await
        .unwrap_err();
    assert!(err.is_unsupported_registry(), "unexpected error: {}", err);
}

#[tokio::test]
async fn push_keeps_other_failures_distinct() {
    let server = MockServer::start().await;
    let image = Image::new(media_type::OCI_IMAGE_CONFIG);
    let root = image.root();
    mount_empty_repository(&server).await;

    Mock::given(method("PUT"))
        .and(path(format!("/v2/app/manifests/{}", root.digest)))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    image.store_in(&store).await;

    let err = client_for(&server)
        .await
        .push(&store, &root, "app", "")
        .await
        .unwrap_err();
    assert!(!err.is_unsupported_registry());
    match err {
        RegistryError::Transfer { operation, source, .. } => {
            assert_eq!(operation, "push");
            assert_eq!(source.status(), Some(500));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn push_skips_content_already_in_registry() {
    let server = MockServer::start().await;
    let image = Image::new(media_type::OCI_IMAGE_CONFIG);
    let root = image.root();

    Mock::given(method("HEAD"))
        .and(path(format!("/v2/app/manifests/{}", root.digest)))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    image.store_in(&store).await;

    client_for(&server).await.push(&store, &root, "app", "").await.unwrap();
}

#[tokio::test]
async fn validates_image_manifest_over_http() {
    let server = MockServer::start().await;
    let image = Image::new(media_type::DOCKER_IMAGE_CONFIG);
    let root = image.root();

    Mock::given(method("GET"))
        .and(path(format!("/v2/app/manifests/{}", root.digest)))
        .respond_with(manifest_response(&image.manifest))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client
        .validate_image_digest("app", &root.digest.to_string(), IndexVersion::V1)
        .await
        .unwrap();

    let manifest = client.get_manifest("app", &root.digest.to_string()).await.unwrap();
    assert_eq!(manifest.layers.len(), 1);
}

#[tokio::test]
async fn rejects_non_image_config() {
    let server = MockServer::start().await;
    let image = Image::new("application/vnd.example.custom+json");
    let root = image.root();

    Mock::given(method("GET"))
        .and(path(format!("/v2/app/manifests/{}", root.digest)))
        .respond_with(manifest_response(&image.manifest))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .validate_image_digest("app", &root.digest.to_string(), IndexVersion::V1)
        .await
        .unwrap_err();
    assert!(err.validation().is_some(), "unexpected error: {}", err);
    assert!(err.to_string().contains("application/vnd.example.custom+json"));
}

#[tokio::test]
async fn get_manifest_reports_decode_failure() {
    let server = MockServer::start().await;
    let body = b"not json".to_vec();
    let digest = Descriptor::for_content("", &body).digest;

    Mock::given(method("GET"))
        .and(path(format!("/v2/app/manifests/{}", digest)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .get_manifest("app", &digest.to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Decode { .. }), "unexpected error: {}", err);
}

#[tokio::test]
async fn head_manifest_surfaces_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/v2/app/manifests/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .head_manifest("app", "missing")
        .await
        .unwrap_err();
    match err {
        RegistryError::Transfer { operation, source, .. } => {
            assert_eq!(operation, "head manifest");
            assert_eq!(source.status(), Some(404));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn sends_user_agent_and_basic_credentials() {
    let server = MockServer::start().await;
    let image = Image::new(media_type::OCI_IMAGE_CONFIG);
    let root = image.root();

    Mock::given(method("GET"))
        .and(path(format!("/v2/app/manifests/{}", root.digest)))
        .and(header("user-agent", DEFAULT_USER_AGENT))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(manifest_response(&image.manifest))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig {
        credentials: Some(AuthConfig::new("user".to_string(), "pass".to_string())),
        ..ClientConfig::default()
    };
    let client = RegistryClient::init_with_config(&server.uri(), &config)
        .await
        .unwrap();
    client.get_manifest("app", &root.digest.to_string()).await.unwrap();
}

#[tokio::test]
async fn resolve_falls_back_to_get_without_digest_header() {
    let server = MockServer::start().await;
    let index = index_body(&[]);

    Mock::given(method("HEAD"))
        .and(path("/v2/app/manifests/multi"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/app/manifests/multi"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(index.clone(), media_type::OCI_INDEX))
        .expect(1)
        .mount(&server)
        .await;

    let descriptor = client_for(&server).await.head_manifest("app", "multi").await.unwrap();
    assert_eq!(descriptor, Descriptor::for_content(media_type::OCI_INDEX, &index));
    assert_eq!(descriptor.media_type, media_type::OCI_INDEX);
    assert_eq!(descriptor.size, index.len() as i64);
}

#[tokio::test]
async fn resolve_rejects_a_different_digest_than_requested() {
    let server = MockServer::start().await;
    let requested = Image::new(media_type::OCI_IMAGE_CONFIG).root();
    let served = Image::new(media_type::DOCKER_IMAGE_CONFIG).manifest;
    let reference = format!("/v2/app/manifests/{}", requested.digest);

    Mock::given(method("HEAD"))
        .and(path(reference.clone()))
        .respond_with(manifest_response(&served))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(reference))
        .respond_with(manifest_response(&served))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .head_manifest("app", &requested.digest.to_string())
        .await
        .unwrap_err();
    match err {
        RegistryError::Transfer {
            source: TransferError::DigestMismatch { expected, .. },
            ..
        } => assert_eq!(expected, requested.digest.to_string()),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn pull_copies_index_graph() {
    let server = MockServer::start().await;
    let image = Image::new(media_type::OCI_IMAGE_CONFIG);
    let child = image.root();
    let index = index_body(std::slice::from_ref(&child));
    let root = Descriptor::for_content(media_type::OCI_INDEX, &index);

    Mock::given(method("HEAD"))
        .and(path("/v2/app/manifests/multi"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    for reference in ["multi".to_string(), root.digest.to_string()] {
        Mock::given(method("GET"))
            .and(path(format!("/v2/app/manifests/{}", reference)))
            .respond_with(ResponseTemplate::new(200).set_body_raw(index.clone(), media_type::OCI_INDEX))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(format!("/v2/app/manifests/{}", child.digest)))
        .respond_with(manifest_response(&image.manifest))
        .expect(1)
        .mount(&server)
        .await;
    for (descriptor, body) in [
        (image.config_descriptor(), &image.config),
        (image.layer_descriptor(), &image.layer),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/v2/app/blobs/{}", descriptor.digest)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let store = FsStore::open(dir.path()).await.unwrap();
    let pulled = client_for(&server).await.pull("app", &store, "multi").await.unwrap();

    assert_eq!(pulled, root);
    assert_eq!(pulled.media_type, media_type::OCI_INDEX);
    assert_eq!(store.fetch(&child).await.unwrap(), image.manifest);
    assert!(store.exists(&image.config_descriptor()).await.unwrap());
    assert!(store.exists(&image.layer_descriptor()).await.unwrap());
    assert_eq!(store.resolve("multi").await.unwrap(), root);
}

#[tokio::test]
async fn pull_skips_subject_missing_from_registry() {
    let server = MockServer::start().await;
    let subject = Image::new(media_type::OCI_IMAGE_CONFIG).root();
    let ztoc = b"ztoc".to_vec();
    let ztoc_desc = Descriptor::for_content("application/octet-stream", &ztoc);
    let referrer = serde_json::to_vec(&serde_json::json!({
        "schemaVersion": 2,
        "mediaType": media_type::OCI_MANIFEST,
        "artifactType": "application/vnd.amazon.soci.index.v2+json",
        "layers": [ztoc_desc],
        "subject": subject,
    }))
    .unwrap();
    let root = Descriptor::for_content(media_type::OCI_MANIFEST, &referrer);
    let reference = format!("/v2/app/manifests/{}", root.digest);

    Mock::given(method("HEAD"))
        .and(path(reference.clone()))
        .respond_with(manifest_response(&referrer))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(reference))
        .respond_with(manifest_response(&referrer))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/app/blobs/{}", ztoc_desc.digest)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ztoc.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/app/manifests/{}", subject.digest)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let pulled = client_for(&server)
        .await
        .pull("app", &store, &root.digest.to_string())
        .await
        .unwrap();

    assert_eq!(pulled, root);
    assert!(store.exists(&ztoc_desc).await.unwrap());
    assert!(!store.exists(&subject).await.unwrap());
}

#[tokio::test]
async fn v2_validates_index_with_head_only() {
    let server = MockServer::start().await;
    let index = index_body(&[]);
    let root = Descriptor::for_content(media_type::OCI_INDEX, &index);
    let reference = format!("/v2/app/manifests/{}", root.digest);

    Mock::given(method("HEAD"))
        .and(path(reference.clone()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Docker-Content-Digest", root.digest.to_string())
                .set_body_raw(index.clone(), media_type::OCI_INDEX),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(reference))
        .respond_with(ResponseTemplate::new(200).set_body_raw(index.clone(), media_type::OCI_INDEX))
        .expect(0)
        .mount(&server)
        .await;

    client_for(&server)
        .await
        .validate_image_digest("app", &root.digest.to_string(), IndexVersion::V2)
        .await
        .unwrap();
}

#[tokio::test]
async fn v1_rejects_index_as_manifest_without_config() {
    let server = MockServer::start().await;
    let index = index_body(&[]);
    let root = Descriptor::for_content(media_type::OCI_INDEX, &index);

    Mock::given(method("GET"))
        .and(path(format!("/v2/app/manifests/{}", root.digest)))
        .respond_with(ResponseTemplate::new(200).set_body_raw(index.clone(), media_type::OCI_INDEX))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .validate_image_digest("app", &root.digest.to_string(), IndexVersion::V1)
        .await
        .unwrap_err();
    assert_eq!(err.validation(), Some(&ValidationError::EmptyConfigMediaType));
}
