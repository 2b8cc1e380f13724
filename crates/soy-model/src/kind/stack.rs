use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Condition, Phase},
    kind::{ExecutionSummary, ExecutionTemplate},
    meta::{ObjectMeta, ObjectRef, Resource},
};

/// A Module reference plus a recurring, drift-aware execution policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Stack {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: StackSpec,
    #[serde(default)]
    pub status: StackStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct StackSpec {
    #[serde(rename = "moduleTemplate", default)]
    pub module_ref: ObjectRef,
    #[serde(default)]
    pub execution_template: ExecutionTemplate,
    /// Run `apply` instead of the template action.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_apply: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift_detection: Option<DriftDetection>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct DriftDetection {
    #[serde(default)]
    pub enabled: bool,
    /// Time between drift checks, e.g. `30m` or `1h 30m`.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "schema", schemars(with = "Option<String>"))]
    pub interval: Option<Duration>,
}

impl StackSpec {
    /// Drift interval, only when detection is enabled and the interval is non-zero.
    pub fn drift_interval(&self) -> Option<Duration> {
        self.drift_detection
            .as_ref()
            .filter(|d| d.enabled)
            .and_then(|d| d.interval)
            .filter(|i| !i.is_zero())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct StackStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_plan: Option<ExecutionSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_apply: Option<ExecutionSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(rename = "lastExecution", default, skip_serializing_if = "String::is_empty")]
    pub last_execution_name: String,
}

impl Resource for Stack {
    const KIND: &'static str = "Stack";

    type Spec = StackSpec;
    type Status = StackStatus;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
    fn spec(&self) -> &StackSpec {
        &self.spec
    }
    fn status(&self) -> &StackStatus {
        &self.status
    }
    fn status_mut(&mut self) -> &mut StackStatus {
        &mut self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_reference_uses_module_template_wire_name() {
        let yaml = r#"
metadata:
  name: prod
  namespace: infra
spec:
  moduleTemplate:
    name: network
  executionTemplate:
    spec:
      action: plan
  autoApply: true
  driftDetection:
    enabled: true
    interval: 30m
"#;
        let stack: Stack = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(stack.spec.module_ref.name, "network");
        assert!(stack.spec.auto_apply);
        assert_eq!(stack.spec.drift_interval(), Some(Duration::from_secs(1800)));

        let json = serde_json::to_value(&stack.spec).unwrap();
        assert_eq!(json["moduleTemplate"]["name"], "network");
        assert_eq!(json["driftDetection"]["interval"], "30m");
    }

    #[test]
    fn disabled_or_zero_drift_has_no_interval() {
        let mut spec = StackSpec {
            drift_detection: Some(DriftDetection {
                enabled: false,
                interval: Some(Duration::from_secs(60)),
            }),
            ..Default::default()
        };
        assert_eq!(spec.drift_interval(), None);

        spec.drift_detection = Some(DriftDetection {
            enabled: true,
            interval: Some(Duration::ZERO),
        });
        assert_eq!(spec.drift_interval(), None);
    }
}
