//! Job construction for an Execution.
use soy_model::{
    Action, Container, Engine, EnvVar, Execution, Job, JobSpec, Module, ObjectMeta, PodSpec,
    PodTemplate, Resource, RestartPolicy, TemplateMetadata,
};
use soy_settings::ExecutionSettings;

const CONTAINER_NAME: &str = "executor";
const ENV_EXECUTION_NAME: &str = "SOYPLANE_EXECUTION_NAME";
const ENV_EXECUTION_NAMESPACE: &str = "SOYPLANE_EXECUTION_NAMESPACE";

/// Engine binary: the Execution's, else the configured default.
pub fn resolve_engine(engine: &Engine, defaults: &ExecutionSettings) -> String {
    let name = engine.name.trim();
    if name.is_empty() {
        defaults.default_engine.clone()
    } else {
        name.to_string()
    }
}

/// Container image for an engine.
///
/// Known engines map to their upstream images when a version is pinned;
/// without a version the configured default image is used.
pub fn resolve_image(engine: &str, version: &str, defaults: &ExecutionSettings) -> String {
    let version = version.trim();
    if version.is_empty() {
        return defaults.default_image.clone();
    }
    match engine.to_ascii_lowercase().as_str() {
        "terraform" => format!("hashicorp/terraform:{version}"),
        "tofu" | "opentofu" => format!("ghcr.io/opentofu/opentofu:{version}"),
        _ => format!("{engine}:{version}"),
    }
}

/// Shell script run by the Job container under `sh -exc`.
pub fn build_script(module: &Module, engine: &str, action: Action) -> String {
    let spec = &module.spec;

    let mut clone = String::from("git clone --depth 1");
    if let Some(version) = spec.version.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        clone.push_str(" --branch ");
        clone.push_str(&quote(version));
    }
    clone.push(' ');
    clone.push_str(&quote(&spec.source));
    clone.push_str(" .");

    let workdir = spec
        .workdir
        .as_deref()
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .unwrap_or(".");
    let engine = quote(engine);
    let run = match action {
        Action::Plan => format!("{engine} plan -input=false"),
        Action::Apply => format!("{engine} apply -input=false -auto-approve"),
    };

    [
        "mkdir -p workspace && cd workspace".to_string(),
        clone,
        format!("cd {}", quote(workdir)),
        format!("{engine} init -input=false"),
        run,
    ]
    .join("\n")
}

/// Quote `s` for POSIX sh unless it is made only of safe characters.
fn quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@+,%".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r#"'"'"'"#))
    }
}

/// Job that runs `exec` against `module`.
///
/// The Job is not yet created: it has a `generateName`, the Execution as
/// controller owner and the job template's metadata on both the Job and its
/// pod template.
pub fn build_job(exec: &Execution, module: &Module, defaults: &ExecutionSettings) -> Job {
    let template = exec.spec.job_template.clone().unwrap_or_default();
    let engine = resolve_engine(&exec.spec.engine, defaults);
    let image = resolve_image(&engine, &exec.spec.engine.version, defaults);
    let script = build_script(module, &engine, exec.spec.action);

    let mut env = template.env;
    env.push(EnvVar::literal(ENV_EXECUTION_NAME, exec.metadata.name.as_str()));
    env.push(EnvVar::literal(ENV_EXECUTION_NAMESPACE, exec.metadata.namespace.as_str()));

    let metadata = ObjectMeta {
        generate_name: Some(template.metadata.generate_name_or(&exec.metadata.name)),
        namespace: exec.metadata.namespace.clone(),
        labels: template.metadata.labels.clone(),
        annotations: template.metadata.annotations.clone(),
        owner_references: vec![exec.controller_ref()],
        ..Default::default()
    };

    Job {
        metadata,
        spec: JobSpec {
            template: PodTemplate {
                metadata: TemplateMetadata {
                    labels: template.metadata.labels,
                    annotations: template.metadata.annotations,
                    generate_name: None,
                },
                spec: PodSpec {
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_string(),
                        image,
                        command: vec!["sh".into(), "-exc".into(), script],
                        args: Vec::new(),
                        env,
                        env_from: template.env_from,
                    }],
                    service_account_name: template.service_account_name,
                    restart_policy: RestartPolicy::Never,
                },
            },
            backoff_limit: Some(0),
        },
        ..Default::default()
    }
}
