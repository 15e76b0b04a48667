//! Integration tests for deploycache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn deploycache() -> Command {
        let mut cmd = cargo_bin_cmd!("deploycache");
        cmd.env_remove("GITHUB_PATH")
            .env_remove("DEPLOYCACHE_CACHE_VERSION")
            .env_remove("DEPLOYCACHE_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }

    #[test]
    fn help_displays() {
        deploycache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("deployment cache orchestrator"));
    }

    #[test]
    fn version_displays() {
        deploycache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("deploycache"));
    }

    #[test]
    fn config_path_honors_flag() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("custom.toml");

        deploycache()
            .current_dir(temp.path())
            .arg("--no-local")
            .arg("-c")
            .arg(&config)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show_uses_defaults() {
        let temp = TempDir::new().unwrap();

        deploycache()
            .current_dir(temp.path())
            .arg("--no-local")
            .arg("-c")
            .arg(temp.path().join("missing.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[resolver]"))
            .stdout(predicate::str::contains("get-deployment-all-cache-names"));
    }

    #[test]
    fn config_init_writes_file() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("nested").join("config.toml");

        deploycache()
            .current_dir(temp.path())
            .arg("--no-local")
            .arg("-c")
            .arg(&config)
            .args(["config", "init"])
            .assert()
            .success();

        let content = std::fs::read_to_string(&config).unwrap();
        assert!(content.contains("[executor]"));
    }

    #[test]
    fn invalid_config_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        std::fs::write(&config, "[cache\nparallelism = ").unwrap();

        deploycache()
            .current_dir(temp.path())
            .arg("--no-local")
            .arg("-c")
            .arg(&config)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn run_requires_cache_version() {
        deploycache()
            .args(["run", "app"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--cache-version"));
    }

    #[test]
    fn cache_list_empty_store() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        let store = temp.path().join("store");
        std::fs::write(
            &config,
            "[cache]\nstore_dir = 'STORE'\n".replace("STORE", &store.display().to_string()),
        )
        .unwrap();

        deploycache()
            .current_dir(temp.path())
            .arg("--no-local")
            .arg("-c")
            .arg(&config)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache entries"));
    }
}

#[cfg(unix)]
mod run_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const RESOLVER: &str = r#"#!/bin/sh
if [ "$1" = "unknown" ]; then
  echo "no such deployment: $1" >&2
  exit 2
fi
echo "resolving $1"
echo '["base", "'"$1"'"]'
"#;

    const EXECUTOR: &str = r#"#!/bin/sh
set -e
echo "$1" >> "$(dirname "$0")/executions.log"
if [ "$1" = "broken" ]; then
  echo "compiler crashed" >&2
  exit 3
fi
mkdir -p "$2/$1"
echo built > "$2/$1/artifact"
echo "/opt/$1/bin" > "$2/$1/paths.txt"
"#;

    const CONFIG: &str = r#"
[resolver]
program = "sh"
args = ["ROOT/resolver.sh", "{deployment}"]

[executor]
program = "sh"
args = ["ROOT/executor.sh", "{deployment}", "{cache_dir}"]

[cache]
store_dir = 'ROOT/store'
parallelism = 2
"#;

    struct Fixture {
        temp: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            fs::write(temp.path().join("resolver.sh"), RESOLVER).unwrap();
            fs::write(temp.path().join("executor.sh"), EXECUTOR).unwrap();
            let root = temp.path().display().to_string();
            fs::write(temp.path().join("config.toml"), CONFIG.replace("ROOT", &root)).unwrap();
            Self { temp }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.temp.path().join(rel)
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("deploycache");
            cmd.current_dir(self.temp.path())
                .env_remove("GITHUB_PATH")
                .env_remove("DEPLOYCACHE_CACHE_VERSION")
                .env_remove("RUST_LOG")
                .arg("--no-local")
                .arg("-c")
                .arg(self.path("config.toml"));
            cmd
        }

        fn run(&self, deployment: &str, cache_dir: &str) -> Command {
            let mut cmd = self.cmd();
            cmd.args(["run", deployment, "--cache-version", "v1", "--cache-dir"])
                .arg(self.path(cache_dir))
                .arg("--github-path")
                .arg(self.path("github_path"));
            cmd
        }

        fn executions(&self) -> usize {
            fs::read_to_string(self.path("executions.log"))
                .map(|s| s.lines().count())
                .unwrap_or(0)
        }
    }

    #[test]
    fn closure_prints_resolved_units() {
        let fx = Fixture::new();

        fx.cmd()
            .args(["closure", "app", "--format", "plain"])
            .assert()
            .success()
            .stdout("base\napp\n");
    }

    #[test]
    fn closure_failure_names_deployment() {
        let fx = Fixture::new();

        fx.cmd()
            .args(["closure", "unknown"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Resolving deployment 'unknown' failed"))
            .stderr(predicate::str::contains("no such deployment"));
    }

    #[test]
    fn first_run_builds_and_second_run_restores() {
        let fx = Fixture::new();

        fx.run("app", "caches-1")
            .assert()
            .success()
            .stderr(predicate::str::contains("0/2 unit(s) restored, 1 saved"));

        assert_eq!(
            fs::read_to_string(fx.path("github_path")).unwrap(),
            "/opt/app/bin\n"
        );

        fx.run("app", "caches-2")
            .assert()
            .success()
            .stderr(predicate::str::contains("1/2 unit(s) restored, 0 saved"));

        assert_eq!(
            fs::read_to_string(fx.path("caches-2/app/artifact")).unwrap(),
            "built\n"
        );
        assert_eq!(fx.executions(), 2);

        fx.cmd()
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout("app-v1\n");
    }

    #[test]
    fn run_without_github_path_prints_entries() {
        let fx = Fixture::new();

        fx.cmd()
            .args(["run", "app", "--cache-version", "v1", "--cache-dir"])
            .arg(fx.path("caches"))
            .assert()
            .success()
            .stdout("/opt/app/bin\n");
    }

    #[test]
    fn executor_failure_is_fatal_and_saves_nothing() {
        let fx = Fixture::new();

        fx.run("broken", "caches")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Executing deployment 'broken' failed"));

        assert_eq!(fx.executions(), 1);
        assert!(!fx.path("github_path").exists());

        fx.cmd()
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout("");
    }

    #[test]
    fn resolver_failure_never_executes() {
        let fx = Fixture::new();

        fx.run("unknown", "caches")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Resolving deployment"));

        assert_eq!(fx.executions(), 0);
    }

    #[test]
    fn cache_clear_empties_store() {
        let fx = Fixture::new();
        fx.run("app", "caches").assert().success();

        fx.cmd()
            .args(["cache", "clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cleared 1 cache entr(ies)"));

        fx.cmd()
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache entries"));
    }
}
