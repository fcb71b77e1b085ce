//! Integration tests for imgcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Isolated config file and store directory per test
    struct Sandbox {
        dir: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
            }
        }

        fn with_config(toml: &str) -> Self {
            let sandbox = Self::new();
            std::fs::write(sandbox.config_path(), toml).unwrap();
            sandbox
        }

        fn config_path(&self) -> PathBuf {
            self.dir.path().join("config.toml")
        }

        fn store_dir(&self) -> PathBuf {
            self.dir.path().join("images")
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("imgcache");
            cmd.env_remove("IMGCACHE_CONFIG")
                .env_remove("IMGCACHE_STORE_DIR")
                .arg("--config")
                .arg(self.config_path())
                .arg("--store-dir")
                .arg(self.store_dir());
            cmd
        }
    }

    /// Config pointing every remote source at a closed local port
    const UNREACHABLE: &str = r#"
[sources]
proxy_base = "http://127.0.0.1:9"
backup_sources = ["http://127.0.0.1:9/backup"]

[fetch]
request_timeout_ms = 500
resolve_timeout_ms = 5000
"#;

    /// Serve a small PNG on a loopback port for every request
    fn serve_png(size: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut body = vec![0u8; size];
        body[..8].copy_from_slice(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(&body);
            }
        });

        format!("http://{}", addr)
    }

    fn read_len(path: &Path) -> usize {
        std::fs::read(path).unwrap().len()
    }

    #[test]
    fn help_displays() {
        Sandbox::new()
            .cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("cache article images"));
    }

    #[test]
    fn version_displays() {
        Sandbox::new()
            .cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("imgcache"));
    }

    #[test]
    fn config_path() {
        Sandbox::new()
            .cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        Sandbox::new()
            .cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[sources]"))
            .stdout(predicate::str::contains("proxy_path = \"/api/image\""));
    }

    #[test]
    fn config_init_and_set() {
        let sandbox = Sandbox::new();
        sandbox.cmd().args(["config", "init"]).assert().success();
        assert!(sandbox.config_path().exists());

        sandbox
            .cmd()
            .args(["config", "set", "sources.use_local_images_only", "true"])
            .assert()
            .success();

        sandbox
            .cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("use_local_images_only = true"));
    }

    #[test]
    fn config_set_unknown_key() {
        Sandbox::new()
            .cmd()
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn invalid_config_reports_hint() {
        Sandbox::with_config("[cache]\nmax_age_ms = \"soon\"\n")
            .cmd()
            .arg("list")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn list_empty() {
        Sandbox::new()
            .cmd()
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached images"));
    }

    #[test]
    fn list_empty_json() {
        Sandbox::new()
            .cmd()
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn get_missing_entry() {
        Sandbox::new()
            .cmd()
            .args(["get", "art-1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No usable cache entry for art-1"));
    }

    #[test]
    fn invalidate_missing_entry() {
        Sandbox::new()
            .cmd()
            .args(["invalidate", "art-1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache entry for art-1"));
    }

    #[test]
    fn evict_empty_store() {
        Sandbox::new()
            .cmd()
            .arg("evict")
            .assert()
            .success()
            .stdout(predicate::str::contains("Evicted 0"));
    }

    #[test]
    fn clear_empty_store() {
        Sandbox::new()
            .cmd()
            .args(["clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already empty"));
    }

    #[test]
    fn resolve_local_only_uses_category_default() {
        Sandbox::with_config("[sources]\nuse_local_images_only = true\n")
            .cmd()
            .args(["resolve", "art-1", "https://cdn.example.com/a.jpg", "--category", "video"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/images/video-default.svg"));
    }

    #[test]
    fn resolve_with_every_source_down_falls_back() {
        let sandbox = Sandbox::with_config(UNREACHABLE);
        sandbox
            .cmd()
            .args(["resolve", "art-1", "--category", "coding"])
            .assert()
            .success()
            .stdout(predicate::str::contains("default\t/images/coding-default.svg"));

        sandbox
            .cmd()
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn probe_unreachable_proxy_fails() {
        Sandbox::with_config(UNREACHABLE)
            .cmd()
            .arg("probe")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn resolve_caches_and_serves_from_cache() {
        let base = serve_png(300);
        let sandbox = Sandbox::with_config(UNREACHABLE);
        let hint = format!("{}/cover.png", base);
        let output = sandbox.dir.path().join("cover.png");

        sandbox
            .cmd()
            .args(["resolve", "art-2", &hint, "--output"])
            .arg(&output)
            .assert()
            .success()
            .stdout(predicate::str::starts_with("network\tblob:imgcache/"))
            .stdout(predicate::str::contains("image/png\t300"));
        assert_eq!(read_len(&output), 300);

        sandbox
            .cmd()
            .args(["resolve", "art-2", &hint])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("cache\t"));

        sandbox
            .cmd()
            .args(["list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("art-2"));

        sandbox
            .cmd()
            .args(["list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"provenance\": \"original\""))
            .stdout(predicate::str::contains(hint.as_str()));

        sandbox
            .cmd()
            .args(["get", "art-2"])
            .assert()
            .success()
            .stdout(predicate::str::contains("300 bytes"));

        sandbox
            .cmd()
            .args(["invalidate", "art-2"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Invalidated art-2"));

        sandbox.cmd().args(["get", "art-2"]).assert().failure();
    }

    #[test]
    fn undersized_download_is_not_cached() {
        let base = serve_png(50);
        let sandbox = Sandbox::with_config(UNREACHABLE);

        sandbox
            .cmd()
            .args(["resolve", "art-3", &format!("{}/tiny.png", base)])
            .assert()
            .success()
            .stdout(predicate::str::contains("/images/llm-default.svg"));

        sandbox
            .cmd()
            .args(["get", "art-3"])
            .assert()
            .failure();
    }

    #[test]
    fn clear_removes_entries() {
        let base = serve_png(200);
        let sandbox = Sandbox::with_config(UNREACHABLE);

        for id in ["a", "b"] {
            sandbox
                .cmd()
                .args(["resolve", id, &format!("{}/{}.png", base, id)])
                .assert()
                .success();
        }

        sandbox
            .cmd()
            .args(["clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 2 cached image(s)"));
    }
}
