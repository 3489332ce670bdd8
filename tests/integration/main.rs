//! Integration tests for ecr-cache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use sha1::{Digest, Sha1};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const PREFIX: &str = "BUILDKITE_PLUGIN_DOCKER_ECR_CACHE_";

    /// Binary with a clean environment carrying only the pipeline identity
    fn ecr_cache(dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("ecr-cache");
        cmd.env_clear()
            .current_dir(dir)
            .env("BUILDKITE_ORGANIZATION_SLUG", "acme")
            .env("BUILDKITE_PIPELINE_SLUG", "web");
        cmd
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM alpine:3.20\n").unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.txt"), "alpha").unwrap();
        fs::write(dir.path().join("src/b.txt"), "beta").unwrap();
        dir
    }

    fn sha1_hex(data: &[u8]) -> String {
        hex::encode(Sha1::digest(data))
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("ecr-cache")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("fingerprint"))
            .stdout(predicate::str::contains("run"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("ecr-cache")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("ecr-cache"));
    }

    #[test]
    fn fingerprint_matches_hash_of_hashes() {
        let dir = project();

        let expected = {
            let concatenated = [
                sha1_hex(b"FROM alpine:3.20\n"),
                sha1_hex(b""),
                sha1_hex(std::env::consts::ARCH.as_bytes()),
                sha1_hex(b"alpha"),
                sha1_hex(b"beta"),
            ]
            .concat();
            sha1_hex(concatenated.as_bytes())[..7].to_string()
        };

        ecr_cache(dir.path())
            .env(format!("{}CACHE_ON", PREFIX), "src/**")
            .arg("fingerprint")
            .assert()
            .success()
            .stdout(format!("{}\n", expected));
    }

    #[test]
    fn fingerprint_is_stable_and_tracks_inputs() {
        let dir = project();
        let run = || {
            let output = ecr_cache(dir.path())
                .env(format!("{}CACHE_ON_0", PREFIX), "src/*.txt")
                .arg("fingerprint")
                .output()
                .unwrap();
            assert!(output.status.success());
            String::from_utf8(output.stdout).unwrap()
        };

        let first = run();
        assert_eq!(first, run());

        fs::write(dir.path().join("src/b.txt"), "gamma").unwrap();
        assert_ne!(first, run());
    }

    #[test]
    fn fingerprint_logs_inputs_to_stderr() {
        let dir = project();
        ecr_cache(dir.path())
            .env(format!("{}CACHE_ON", PREFIX), "src/**")
            .arg("fingerprint")
            .assert()
            .success()
            .stderr(predicate::str::contains("src/a.txt"));
    }

    #[test]
    fn fingerprint_json_lists_inputs() {
        let dir = project();
        let output = ecr_cache(dir.path())
            .env(format!("{}CACHE_ON", PREFIX), "src/**")
            .env(format!("{}BUILD_ARGS", PREFIX), "MODE=ci")
            .args(["fingerprint", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(report["algorithm"], "sha1");
        assert_eq!(report["fingerprint"].as_str().unwrap().len(), 7);
        // Dockerfile, target, architecture, one build arg, two files
        assert_eq!(report["inputs"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn sha256_changes_fingerprint() {
        let dir = project();
        let fingerprint = |algorithm: &str| {
            let output = ecr_cache(dir.path())
                .env(format!("{}HASH_ALGORITHM", PREFIX), algorithm)
                .arg("fingerprint")
                .output()
                .unwrap();
            assert!(output.status.success());
            String::from_utf8(output.stdout).unwrap()
        };
        assert_ne!(fingerprint("sha1"), fingerprint("sha256"));
    }

    #[test]
    fn missing_dockerfile_fails() {
        let dir = TempDir::new().unwrap();
        ecr_cache(dir.path())
            .arg("fingerprint")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Build spec not found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn config_shows_defaults() {
        let dir = project();
        ecr_cache(dir.path())
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "repository_name = \"build-cache/acme/web\"",
            ))
            .stdout(predicate::str::contains("max_age_days = 30"))
            .stdout(predicate::str::contains(
                "export_env_variable = \"BUILDKITE_PLUGIN_DOCKER_IMAGE\"",
            ));
    }

    #[test]
    fn config_file_is_overridden_by_properties() {
        let dir = project();
        let path = dir.path().join("ecr-cache.toml");
        fs::write(
            &path,
            "repository_name = \"from-file\"\nmax_age_days = 7\n\n[tags]\nteam = \"infra\"\n",
        )
        .unwrap();

        ecr_cache(dir.path())
            .env(format!("{}MAX_AGE_DAYS", PREFIX), "14")
            .args(["--config", path.to_str().unwrap(), "config"])
            .assert()
            .success()
            .stdout(predicate::str::contains("repository_name = \"from-file\""))
            .stdout(predicate::str::contains("max_age_days = 14"))
            .stdout(predicate::str::contains("team = \"infra\""));
    }

    #[test]
    fn run_without_pipeline_identity_fails() {
        let dir = project();
        cargo_bin_cmd!("ecr-cache")
            .env_clear()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("BUILDKITE_ORGANIZATION_SLUG"));
    }

    #[test]
    fn fingerprint_works_outside_a_pipeline() {
        let dir = project();
        cargo_bin_cmd!("ecr-cache")
            .env_clear()
            .current_dir(dir.path())
            .arg("fingerprint")
            .assert()
            .success()
            .stdout(predicate::str::is_match("^[0-9a-f]{7}\n$").unwrap());
    }

    #[test]
    fn config_outside_a_pipeline_omits_repository() {
        let dir = project();
        cargo_bin_cmd!("ecr-cache")
            .env_clear()
            .current_dir(dir.path())
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("repository_name").not());
    }

    #[test]
    fn invalid_max_age_fails() {
        let dir = project();
        ecr_cache(dir.path())
            .env(format!("{}MAX_AGE_DAYS", PREFIX), "0")
            .arg("config")
            .assert()
            .failure()
            .stderr(predicate::str::contains("max-age-days"));
    }

    #[test]
    fn invalid_export_variable_fails_before_registry() {
        let dir = project();
        ecr_cache(dir.path())
            .env(format!("{}EXPORT_ENV_VARIABLE", PREFIX), "NOT-VALID")
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("not a valid variable name"));
    }
}
