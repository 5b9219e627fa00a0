// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide default
    paths.push(PathBuf::from("/etc/lunar/config.yaml"));
    paths.push(PathBuf::from("/etc/lunar/config.yml"));

    // 2. XDG / home
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("lunar/config.yaml"));
        paths.push(cfg.join("lunar/config.yml"));
    }

    // 3. Workspace-local
    paths.push(PathBuf::from(".lunar/config.yaml"));
    paths.push(PathBuf::from(".lunar/config.yml"));
    paths.push(PathBuf::from("lunar.yaml"));
    paths.push(PathBuf::from("lunar.yml"));

    paths
}

/// Load configuration by merging all discovered YAML files, then resolving
/// `${VAR}` environment placeholders inside `mcp_servers` entries.
/// The `extra` argument may provide an explicit path (e.g. `--config` CLI flag).
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };

    resolve_env_placeholders(&mut config);
    Ok(config)
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

/// Resolve `${VAR}` placeholders inside `mcp_servers[*].args`/`env` against
/// the process environment. Unresolved variables are left verbatim so a
/// missing env var surfaces as a visibly broken argument rather than a
/// silent empty string.
fn resolve_env_placeholders(config: &mut Config) {
    for server in config.mcp_servers.values_mut() {
        for arg in server.args.iter_mut() {
            *arg = expand_placeholders(arg);
        }
        for value in server.env.values_mut() {
            *value = expand_placeholders(value);
        }
        if let Some(url) = server.url.as_mut() {
            *url = expand_placeholders(url);
        }
    }
}

fn expand_placeholders(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        if let Some(end) = after.find('}') {
            let var = &after[..end];
            match std::env::var(var) {
                Ok(value) => out.push_str(&value),
                Err(_) => out.push_str(&format!("${{{var}}}")),
            }
            rest = &after[end + 1..];
        } else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        }
    }
    out.push_str(rest);
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn val(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val("x: 1");
        let src = val("x: 2");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["x"].as_i64(), Some(2));
    }

    #[test]
    fn merge_preserves_keys_not_in_src() {
        let mut dst = val("a: 1\nb: 2");
        let src = val("b: 99");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["a"].as_i64(), Some(1));
        assert_eq!(dst["b"].as_i64(), Some(99));
    }

    #[test]
    fn merge_nested_tables() {
        let mut dst = val("model:\n  provider: openai\n  name: gpt-4o");
        let src = val("model:\n  name: gpt-4o-mini");
        merge_yaml(&mut dst, src);
        assert_eq!(dst["model"]["provider"].as_str(), Some("openai"));
        assert_eq!(dst["model"]["name"].as_str(), Some("gpt-4o-mini"));
    }

    #[test]
    fn load_returns_error_when_explicit_path_missing() {
        let result = load(Some(Path::new("/tmp/lunar_nonexistent_config_xyz.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_with_no_extra_path_returns_defaults() {
        let cfg = load(None).unwrap();
        assert_eq!(cfg.model.provider, "openai");
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "model:\n  provider: mock\n  name: test-model").unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.model.provider, "mock");
        assert_eq!(cfg.model.name, "test-model");
    }

    #[test]
    fn expand_placeholders_substitutes_known_var() {
        std::env::set_var("LUNAR_TEST_PLACEHOLDER", "secret123");
        assert_eq!(expand_placeholders("tok=${LUNAR_TEST_PLACEHOLDER}"), "tok=secret123");
        std::env::remove_var("LUNAR_TEST_PLACEHOLDER");
    }

    #[test]
    fn expand_placeholders_leaves_unknown_var_verbatim() {
        assert_eq!(
            expand_placeholders("${LUNAR_TEST_DOES_NOT_EXIST_XYZ}"),
            "${LUNAR_TEST_DOES_NOT_EXIST_XYZ}"
        );
    }

    #[test]
    fn resolve_env_placeholders_in_mcp_server_args() {
        std::env::set_var("LUNAR_TEST_TOKEN", "abc");
        let yaml_str = "mcp_servers:\n  w:\n    command: weather\n    args: [\"--token\", \"${LUNAR_TEST_TOKEN}\"]\n";
        let cfg = {
            let v: serde_yaml::Value = serde_yaml::from_str(yaml_str).unwrap();
            let mut c: Config = serde_yaml::from_value(v).unwrap();
            resolve_env_placeholders(&mut c);
            c
        };
        assert_eq!(cfg.mcp_servers["w"].args[1], "abc");
        std::env::remove_var("LUNAR_TEST_TOKEN");
    }
}
