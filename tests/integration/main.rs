//! Integration tests for shelf

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Scratch directory holding a config file and a cache root
    struct Sandbox {
        dir: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let config = format!(
                "[cache]\nroot = {:?}\n",
                dir.path().join("cache").display().to_string()
            );
            fs::write(dir.path().join("config.toml"), config).unwrap();
            Self { dir }
        }

        fn path(&self) -> &Path {
            self.dir.path()
        }

        fn cache_root(&self) -> PathBuf {
            self.dir.path().join("cache")
        }

        fn shelf(&self) -> Command {
            let mut cmd = shelf();
            cmd.arg("--config").arg(self.path().join("config.toml"));
            cmd
        }

        fn touch(&self, rel: &str) -> PathBuf {
            let path = self.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, rel).unwrap();
            path
        }
    }

    fn shelf() -> Command {
        let mut cmd = cargo_bin_cmd!("shelf");
        for var in [
            "SHELF_CONFIG",
            "SHELF_CACHE_DIR",
            "SHELF_CACHE_PREFIX",
            "SHELF_DEVELOPMENT",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    #[test]
    fn help_displays() {
        shelf()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("file-backed TTL cache"));
    }

    #[test]
    fn version_displays() {
        shelf()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shelf"));
    }

    #[test]
    fn config_path() {
        shelf()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let sandbox = Sandbox::new();
        sandbox
            .shelf()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"))
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn missing_explicit_config_fails() {
        let sandbox = Sandbox::new();
        shelf()
            .arg("--config")
            .arg(sandbox.path().join("absent.toml"))
            .args(["cache", "list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"))
            .stderr(predicate::str::contains("shelf config init"));
    }

    #[test]
    fn set_then_get_value() {
        let sandbox = Sandbox::new();
        sandbox
            .shelf()
            .args(["cache", "set", "user/42", r#"{"name":"ada","tags":[1,2]}"#])
            .assert()
            .success();

        assert!(sandbox.cache_root().join("user").join("42.var.cache").is_file());

        sandbox
            .shelf()
            .args(["cache", "get", "user/42"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"ada\""));
    }

    #[test]
    fn get_missing_entry_fails() {
        let sandbox = Sandbox::new();
        sandbox
            .shelf()
            .args(["cache", "get", "nothing-here"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cache entry not found"));
    }

    #[test]
    fn prefix_flag_separates_entries() {
        let sandbox = Sandbox::new();
        sandbox
            .shelf()
            .args(["--prefix", "dev_", "cache", "set", "greeting", "hi"])
            .assert()
            .success();

        assert!(sandbox.cache_root().join("dev_greeting.var.cache").is_file());
        sandbox
            .shelf()
            .args(["cache", "get", "greeting"])
            .assert()
            .failure();
    }

    #[test]
    fn counters_store_default_then_step() {
        let sandbox = Sandbox::new();
        sandbox
            .shelf()
            .args(["cache", "incr", "hits"])
            .assert()
            .success()
            .stdout("0\n");
        sandbox
            .shelf()
            .args(["cache", "incr", "hits"])
            .assert()
            .success()
            .stdout("1\n");
        sandbox
            .shelf()
            .args(["cache", "decr", "hits", "--step", "5"])
            .assert()
            .success()
            .stdout("-4\n");
    }

    #[test]
    fn drop_removes_entry() {
        let sandbox = Sandbox::new();
        sandbox
            .shelf()
            .args(["cache", "set", "temp", "1"])
            .assert()
            .success();
        sandbox
            .shelf()
            .args(["cache", "drop", "temp"])
            .assert()
            .success();
        sandbox
            .shelf()
            .args(["cache", "get", "temp"])
            .assert()
            .failure();
    }

    #[test]
    fn list_shows_entries() {
        let sandbox = Sandbox::new();
        sandbox
            .shelf()
            .args(["cache", "set", "pages/home", "\"<p>hi</p>\""])
            .assert()
            .success();
        sandbox
            .shelf()
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout("pages/home\n");
    }

    #[test]
    fn clear_with_yes_removes_everything() {
        let sandbox = Sandbox::new();
        sandbox
            .shelf()
            .args(["cache", "set", "a/b/c", "1"])
            .assert()
            .success();
        sandbox
            .shelf()
            .args(["cache", "clear", "-y"])
            .assert()
            .success();

        assert_eq!(fs::read_dir(sandbox.cache_root()).unwrap().count(), 0);
    }

    #[test]
    fn index_build_and_lookup() {
        let sandbox = Sandbox::new();
        let home = sandbox.touch("views/pages/home.tpl");
        sandbox.touch("views/readme.txt");
        let views = sandbox.path().join("views");

        sandbox
            .shelf()
            .args(["index", "build", "templates", "--path"])
            .arg(&views)
            .assert()
            .success();

        assert!(sandbox.cache_root().join("templates.var.cache").is_file());

        let expected = home.canonicalize().unwrap();
        sandbox
            .shelf()
            .args(["index", "lookup", "templates", "home", "--path"])
            .arg(&views)
            .assert()
            .success()
            .stdout(predicate::str::contains(expected.display().to_string()));

        sandbox
            .shelf()
            .args(["index", "lookup", "templates", "readme", "--path"])
            .arg(&views)
            .assert()
            .failure();
    }

    #[test]
    fn index_lookup_refreshes_in_dev_mode() {
        let sandbox = Sandbox::new();
        sandbox.touch("lang/en.lang");
        let lang = sandbox.path().join("lang");

        sandbox
            .shelf()
            .args(["index", "build", "languages", "--path"])
            .arg(&lang)
            .assert()
            .success();
        sandbox.touch("lang/fr.lang");

        sandbox
            .shelf()
            .args(["index", "lookup", "languages", "fr", "--path"])
            .arg(&lang)
            .assert()
            .failure();
        sandbox
            .shelf()
            .args(["--dev", "index", "lookup", "languages", "fr", "--path"])
            .arg(&lang)
            .assert()
            .success()
            .stdout(predicate::str::contains("fr.lang"));
    }

    #[test]
    fn unknown_index_kind_fails() {
        let sandbox = Sandbox::new();
        sandbox
            .shelf()
            .args(["index", "list", "scripts"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown index kind"))
            .stderr(predicate::str::contains("Valid kinds"));
    }

    #[test]
    fn missing_index_location_fails() {
        let sandbox = Sandbox::new();
        sandbox
            .shelf()
            .args(["index", "build", "classes", "--path"])
            .arg(sandbox.path().join("nope"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("does not exist"));
    }

    #[cfg(unix)]
    #[test]
    fn exec_replays_cached_output() {
        let sandbox = Sandbox::new();
        let marker = sandbox.path().join("runs");
        let script = format!("echo run >> {:?}; echo hello", marker.display().to_string());

        for _ in 0..2 {
            sandbox
                .shelf()
                .args(["cache", "exec", "greet", "--ttl", "-1", "--", "sh", "-c", &script])
                .assert()
                .success()
                .stdout("hello\n");
        }

        assert_eq!(fs::read_to_string(&marker).unwrap(), "run\n");
        assert!(sandbox.cache_root().join("greet.con.cache").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn exec_without_cache_always_runs() {
        let sandbox = Sandbox::new();
        let marker = sandbox.path().join("runs");
        let script = format!("echo run >> {:?}", marker.display().to_string());

        for _ in 0..2 {
            sandbox
                .shelf()
                .args(["--no-cache", "cache", "exec", "tick", "--", "sh", "-c", &script])
                .assert()
                .success();
        }

        assert_eq!(fs::read_to_string(&marker).unwrap(), "run\nrun\n");
        assert!(!sandbox.cache_root().join("tick.con.cache").exists());
    }
}
