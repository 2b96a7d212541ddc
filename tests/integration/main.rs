//! Integration tests for cachefront

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn cachefront() -> Command {
        cargo_bin_cmd!("cachefront")
    }

    /// Config file whose disk storage lives inside `dir`
    fn write_config(dir: &Path) -> PathBuf {
        let path = dir.join("config.toml");
        let content = format!(
            "[worker]\norigin = \"http://127.0.0.1:9\"\nversion = \"v3\"\n\n\
             [storage]\nbackend = \"disk\"\npath = \"{}\"\n",
            dir.join("caches").display()
        );
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn help_displays() {
        cachefront()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("cache-first offline proxy"));
    }

    #[test]
    fn version_displays() {
        cachefront()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("cachefront"));
    }

    #[test]
    fn config_path() {
        cachefront()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());
        cachefront()
            .arg("-c")
            .arg(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[worker]").and(predicate::str::contains("v3")));
    }

    #[test]
    fn config_init_then_set() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("nested").join("config.toml");

        cachefront()
            .arg("-c")
            .arg(&config)
            .args(["config", "init"])
            .assert()
            .success();
        assert!(config.exists());

        cachefront()
            .arg("-c")
            .arg(&config)
            .args(["config", "set", "worker.version", "v7"])
            .assert()
            .success();
        let saved = std::fs::read_to_string(&config).unwrap();
        assert!(saved.contains("version = \"v7\""));
    }

    #[test]
    fn config_set_unknown_key() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());
        cachefront()
            .arg("-c")
            .arg(&config)
            .args(["config", "set", "worker.colour", "blue"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(&config, "[worker]\nversion = \"has space\"\n").unwrap();

        cachefront()
            .arg("-c")
            .arg(&config)
            .arg("caches")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn caches_empty() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());
        cachefront()
            .arg("-c")
            .arg(&config)
            .arg("caches")
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache generations found"));
    }

    #[test]
    fn serve_refuses_to_forward_to_itself() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(
            &config,
            "[worker]\norigin = \"http://127.0.0.1:18081\"\n\n\
             [server]\nlisten = \"127.0.0.1:18081\"\n",
        )
        .unwrap();

        cachefront()
            .arg("-c")
            .arg(&config)
            .args(["serve", "--ephemeral"])
            .timeout(std::time::Duration::from_secs(10))
            .assert()
            .failure()
            .stderr(predicate::str::contains("forwarded back to the proxy"));
    }

    #[test]
    fn offline_fetch_without_install_fails() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path());
        cachefront()
            .arg("-c")
            .arg(&config)
            .args(["fetch", "/some/new/route", "--offline"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("offline fallback"));
    }
}

mod scenario_tests {
    use cachefront::config::schema::WorkerConfig;
    use cachefront::http::{Request, RequestKey};
    use cachefront::network::StubTransport;
    use cachefront::storage::{CacheStorage, DiskStorage, MemoryStorage};
    use cachefront::worker::{FetchOutcome, Registration, Responded, ResponseSource, Worker};
    use std::sync::Arc;
    use tempfile::TempDir;
    use url::Url;

    const ORIGIN: &str = "https://app.test";

    fn worker_config(version: &str) -> WorkerConfig {
        WorkerConfig {
            origin: ORIGIN.to_string(),
            version: version.to_string(),
            static_label: "shell-static".to_string(),
            dynamic_label: "shell-dynamic".to_string(),
            manifest: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/manifest.json".to_string(),
            ],
            offline_fallback: "/index.html".to_string(),
            skip_waiting: true,
        }
    }

    fn upstream() -> Arc<StubTransport> {
        let transport = Arc::new(StubTransport::new());
        transport
            .route("https://app.test/", 200, "<root>")
            .route("https://app.test/index.html", 200, "<shell>")
            .route("https://app.test/manifest.json", 200, "{\"name\":\"app\"}")
            .route("https://app.test/api/items", 200, "[1,2,3]");
        transport
    }

    async fn responded(registration: &Registration, url: &str) -> Responded {
        match registration.fetch(&Request::get_str(url).unwrap()).await.unwrap() {
            FetchOutcome::Responded(responded) => responded,
            FetchOutcome::Declined => panic!("{} was declined", url),
        }
    }

    #[tokio::test]
    async fn manifest_assets_served_without_network() {
        let storage = Arc::new(MemoryStorage::new());
        let transport = upstream();
        let registration = Registration::new();
        let worker = Worker::new(&worker_config("v1"), storage.clone(), transport.clone()).unwrap();
        registration.register(Arc::new(worker)).await;

        let calls = transport.call_count();
        transport.set_offline(true);

        let hit = responded(&registration, "https://app.test/manifest.json").await;
        assert_eq!(hit.source, ResponseSource::Cache);
        assert_eq!(&hit.response.into_body()[..], b"{\"name\":\"app\"}");
        assert_eq!(transport.call_count(), calls);
    }

    #[tokio::test]
    async fn outage_serves_shell_for_unknown_route() {
        let storage = Arc::new(MemoryStorage::new());
        let transport = upstream();
        let registration = Registration::new();
        let worker = Worker::new(&worker_config("v1"), storage.clone(), transport.clone()).unwrap();
        registration.register(Arc::new(worker)).await;

        transport.set_offline(true);
        let fallback = responded(&registration, "https://app.test/some/new/route").await;
        assert_eq!(fallback.source, ResponseSource::OfflineFallback);
        assert_eq!(&fallback.response.into_body()[..], b"<shell>");
    }

    #[tokio::test]
    async fn runtime_responses_are_stored_for_later_outages() {
        let storage = Arc::new(MemoryStorage::new());
        let transport = upstream();
        let registration = Registration::new();
        let worker = Worker::new(&worker_config("v1"), storage.clone(), transport.clone()).unwrap();
        registration.register(Arc::new(worker)).await;

        let mut first = responded(&registration, "https://app.test/api/items").await;
        assert_eq!(first.source, ResponseSource::Network);
        first.settle().await;

        transport.set_offline(true);
        let second = responded(&registration, "https://app.test/api/items").await;
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(&second.response.into_body()[..], b"[1,2,3]");
    }

    #[tokio::test]
    async fn activation_removes_unrelated_generations() {
        let storage = Arc::new(MemoryStorage::new());
        for name in ["legacy-a", "legacy-b", "shell-static-v0"] {
            storage.open(name).await.unwrap();
        }

        let registration = Registration::new();
        let worker = Worker::new(&worker_config("v1"), storage.clone(), upstream()).unwrap();
        registration.register(Arc::new(worker)).await;

        let remaining = storage.keys().await.unwrap();
        assert_eq!(remaining, vec!["shell-static-v1"]);
    }

    #[tokio::test]
    async fn version_bump_rotates_generations() {
        let storage = Arc::new(MemoryStorage::new());
        let transport = upstream();
        let registration = Registration::new();

        let v1 = Worker::new(&worker_config("v1"), storage.clone(), transport.clone()).unwrap();
        registration.register(Arc::new(v1)).await;
        responded(&registration, "https://app.test/api/items").await.settle().await;
        assert!(storage.keys().await.unwrap().contains(&"shell-dynamic-v1".to_string()));

        let v2 = Worker::new(&worker_config("v2"), storage.clone(), transport.clone()).unwrap();
        registration.register(Arc::new(v2)).await;

        assert_eq!(storage.keys().await.unwrap(), vec!["shell-static-v2"]);
        assert_eq!(registration.active().unwrap().version(), "v2");
    }

    #[tokio::test]
    async fn disk_generations_survive_restart() {
        let dir = TempDir::new().unwrap();
        let transport = upstream();

        {
            let storage = Arc::new(DiskStorage::new(dir.path().to_path_buf()));
            let worker = Worker::new(&worker_config("v1"), storage, transport.clone()).unwrap();
            worker.install().await.unwrap();
        }

        let storage = DiskStorage::new(dir.path().to_path_buf());
        let url = Url::parse("https://app.test/index.html").unwrap();
        let cached = storage.match_any(&RequestKey::get(&url)).await.unwrap().unwrap();
        assert_eq!(&cached.into_body()[..], b"<shell>");
    }
}
