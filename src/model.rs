use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Command,
    Manual,
}

/// One unit of work inside a methodology: an automated command or a
/// manual action confirmed by uploaded evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub content: String,
    #[serde(rename = "requiresUpload")]
    pub requires_upload: bool,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl Step {
    pub fn command(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: StepKind::Command,
            content: content.into(),
            requires_upload: false,
            completed: false,
            evidence: Vec::new(),
        }
    }

    pub fn manual(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: StepKind::Manual,
            content: content.into(),
            requires_upload: true,
            completed: false,
            evidence: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("step id must be non-empty".to_string());
        }
        let manual = self.kind == StepKind::Manual;
        if self.requires_upload != manual {
            return Err(format!(
                "step `{}` must set requiresUpload exactly when it is manual",
                self.id
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Methodology {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    // Legacy flat mirror of command-step contents; kept so PUT
    // round-trips against the persistence service do not drop it.
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, rename = "targetIP", skip_serializing_if = "Option::is_none")]
    pub target_ip: Option<String>,
}

impl Methodology {
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = BTreeSet::new();
        for step in &self.steps {
            step.validate()?;
            if !seen.insert(step.id.as_str()) {
                return Err(format!("duplicate step id `{}`", step.id));
            }
        }
        Ok(())
    }

    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    pub fn step_mut(&mut self, step_id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|step| step.id == step_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Completed,
}

fn default_project_status() -> ProjectStatus {
    ProjectStatus::Active
}

/// Engagement a methodology runs against; owns the substitution
/// variables used inside command text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub target: String,
    #[serde(default, rename = "targetIP", skip_serializing_if = "Option::is_none")]
    pub target_ip: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(default = "default_project_status")]
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Record returned by the manual-evidence collaborator for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: i64,
    pub project_id: i64,
    pub methodology_id: i64,
    pub step_id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_path: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub uploaded_at: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_constructors_uphold_the_upload_invariant() {
        let command = Step::command("step-1", "nmap {{target}}");
        assert!(!command.requires_upload);
        command.validate().expect("command step");

        let manual = Step::manual("step-2", "verify access");
        assert!(manual.requires_upload);
        manual.validate().expect("manual step");
    }

    #[test]
    fn validate_rejects_upload_flag_mismatch() {
        let mut step = Step::command("step-1", "ls");
        step.requires_upload = true;
        let err = step.validate().expect_err("mismatch");
        assert!(err.contains("requiresUpload"));
    }

    #[test]
    fn validate_rejects_duplicate_step_ids() {
        let methodology = Methodology {
            id: 1,
            name: "web".to_string(),
            description: None,
            commands: Vec::new(),
            steps: vec![Step::command("dup", "ls"), Step::manual("dup", "check")],
            target: None,
            target_ip: None,
        };
        let err = methodology.validate().expect_err("duplicate");
        assert!(err.contains("duplicate step id"));
    }

    #[test]
    fn wire_names_match_the_dashboard_json() {
        let step = Step::manual("step-1", "confirm scope");
        let value = serde_json::to_value(&step).expect("serialize");
        assert_eq!(value["type"], "manual");
        assert_eq!(value["requiresUpload"], true);

        let project: Project = serde_json::from_value(serde_json::json!({
            "id": 7,
            "name": "Acme",
            "target": "acme.example",
            "targetIP": "10.0.0.9",
            "createdAt": "2024-05-01T10:00:00Z",
            "status": "active"
        }))
        .expect("deserialize project");
        assert_eq!(project.target_ip.as_deref(), Some("10.0.0.9"));
        assert_eq!(project.status, ProjectStatus::Active);
    }

    #[test]
    fn methodology_tolerates_missing_optional_fields() {
        let methodology: Methodology = serde_json::from_value(serde_json::json!({
            "id": 3,
            "name": "recon"
        }))
        .expect("deserialize methodology");
        assert!(methodology.steps.is_empty());
        assert!(methodology.commands.is_empty());
        assert_eq!(methodology.description, None);
    }
}
