use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::info;

use super::ConfigDocument;
use super::Directive;
use crate::utils::file_io::read_optional;
use crate::utils::file_io::write_atomically;
use crate::CoordinationError;
use crate::CoordinatorConfig;
use crate::Result;
use crate::Role;
use crate::RoleDecision;
use crate::TopologyMode;

/// Named values for `${NAME}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateParams(BTreeMap<String, String>);

impl TemplateParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Replaces every `${NAME}`; an unknown name is an error. A `$` that does not
/// open a placeholder is copied as is.
pub fn substitute(
    template: &str,
    params: &TemplateParams,
) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let name = &after[..end];
        let value = params
            .get(name)
            .ok_or_else(|| CoordinationError::MissingPlaceholder(name.to_string()))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// First-start document: the template with its placeholders filled.
pub fn seed(
    template: &str,
    params: &TemplateParams,
) -> Result<ConfigDocument> {
    Ok(ConfigDocument::parse(&substitute(template, params)?))
}

/// Sets `directives` and the replication line for `role` on `doc`.
///
/// Re-running on its own output yields the same document: every directive
/// is set in place rather than appended. No placeholder expansion happens
/// here, so values such as passwords pass through verbatim.
pub fn materialize(
    role: Option<&RoleDecision>,
    mut doc: ConfigDocument,
    directives: &[Directive],
) -> ConfigDocument {
    for directive in directives {
        doc.set(directive);
    }

    match role {
        Some(decision) if decision.role == Role::Replica => {
            doc.remove("slaveof");
            doc.set(&Directive::new(
                "replicaof",
                format!("{} {}", decision.primary.host, decision.primary.port),
            ));
        }
        Some(decision) if decision.role == Role::Primary => {
            doc.remove("slaveof");
            doc.remove("replicaof");
        }
        _ => {}
    }
    doc
}

/// Engine directives owned by the coordinator.
pub fn engine_directives(config: &CoordinatorConfig) -> Vec<Directive> {
    let node = &config.node;
    let password = &config.credentials.admin_password;
    let module = format!("{} {}", node.module_path, node.module_args);

    let mut directives = vec![
        Directive::new("dir", node.data_dir.display().to_string()),
        Directive::new("loglevel", node.engine_log_level.clone()),
        Directive::new("loadmodule", module.trim_end()),
        Directive::new("requirepass", password.clone()),
        Directive::new("masterauth", password.clone()),
        Directive::new("appendonly", "yes"),
        Directive::new("appendfsync", config.persistence.fsync.as_str()),
        Directive::new("replica-announce-ip", node.announce_host()),
        Directive::new("protected-mode", "no"),
    ];

    if config.tls.enable_tls {
        directives.extend([
            Directive::new("port", "0"),
            Directive::new("tls-port", node.port.to_string()),
            Directive::new("tls-cert-file", config.tls.cert_path.display().to_string()),
            Directive::new("tls-key-file", config.tls.key_path.display().to_string()),
            Directive::new("tls-ca-cert-file", config.tls.ca_cert_path.display().to_string()),
            Directive::new("tls-replication", "yes"),
            Directive::new("tls-auth-clients", "optional"),
        ]);
    } else {
        directives.push(Directive::new("port", node.port.to_string()));
    }

    if node.topology == TopologyMode::Sharded {
        directives.extend([
            Directive::new("cluster-enabled", "yes"),
            Directive::new("cluster-config-file", config.cluster.record_file.clone()),
            Directive::new("cluster-node-timeout", config.cluster.node_timeout_ms.to_string()),
            Directive::new("cluster-port", node.bus_port().to_string()),
            Directive::new("cluster-announce-hostname", node.announce_host()),
            Directive::new("cluster-preferred-endpoint-type", "hostname"),
        ]);
        if config.tls.enable_tls {
            directives.push(Directive::new("tls-cluster", "yes"));
        }
    }
    directives
}

/// Directives for a co-located monitor process.
pub fn monitor_directives(config: &CoordinatorConfig) -> Vec<Directive> {
    let password = &config.credentials.admin_password;
    let mut directives = vec![
        Directive::new("dir", config.node.data_dir.display().to_string()),
        Directive::new("sentinel resolve-hostnames", "yes"),
        Directive::new("sentinel announce-hostnames", "yes"),
        Directive::new("sentinel announce-ip", config.node.announce_host()),
        Directive::new("requirepass", password.clone()),
        Directive::new("sentinel sentinel-pass", password.clone()),
    ];
    if config.tls.enable_tls {
        directives.extend([
            Directive::new("port", "0"),
            Directive::new("tls-port", config.monitor.port.to_string()),
            Directive::new("tls-cert-file", config.tls.cert_path.display().to_string()),
            Directive::new("tls-key-file", config.tls.key_path.display().to_string()),
            Directive::new("tls-ca-cert-file", config.tls.ca_cert_path.display().to_string()),
            Directive::new("tls-replication", "yes"),
        ]);
    } else {
        directives.push(Directive::new("port", config.monitor.port.to_string()));
    }
    directives
}

/// Placeholder values every template may use.
pub fn template_params(config: &CoordinatorConfig) -> TemplateParams {
    TemplateParams::new()
        .with("NODE_HOST", config.node.announce_host())
        .with("NODE_PORT", config.node.port.to_string())
        .with("BUS_PORT", config.node.bus_port().to_string())
        .with("DATA_DIR", config.node.data_dir.display().to_string())
        .with("ADMIN_PASSWORD", config.credentials.admin_password.clone())
        .with("LOG_LEVEL", config.node.engine_log_level.clone())
        .with("MODULE_PATH", config.node.module_path.clone())
        .with("MONITOR_PORT", config.monitor.port.to_string())
}

/// Owns one configuration file on disk.
#[derive(Debug, Clone)]
pub struct ConfigMaterializer {
    path: PathBuf,
    template: Option<PathBuf>,
}

impl ConfigMaterializer {
    pub fn new(
        path: impl Into<PathBuf>,
        template: Option<PathBuf>,
    ) -> Self {
        Self {
            path: path.into(),
            template,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Materializes on top of the existing file (or the template on first
    /// start) and writes only when the content changed. Placeholders are
    /// expanded in the template only; an existing file is taken as is.
    pub async fn apply(
        &self,
        role: Option<&RoleDecision>,
        params: &TemplateParams,
        directives: &[Directive],
    ) -> Result<ConfigDocument> {
        let existing = read_optional(&self.path).await?;
        let base = match (&existing, &self.template) {
            (Some(text), _) => ConfigDocument::parse(text),
            (None, Some(template)) => seed(&read_optional(template).await?.unwrap_or_default(), params)?,
            (None, None) => ConfigDocument::default(),
        };

        let doc = materialize(role, base, directives);
        let rendered = doc.render();
        if existing.as_deref() == Some(rendered.as_str()) {
            debug!("{} already up to date", self.path.display());
        } else {
            write_atomically(&self.path, rendered.as_bytes()).await?;
            info!("materialized {}", self.path.display());
        }
        Ok(doc)
    }
}
