use crate::model::Project;

pub const TARGET_TOKEN: &str = "{{target}}";
pub const TARGET_IP_TOKEN: &str = "{{targetIP}}";
pub const PROJECT_TOKEN: &str = "{{project}}";

/// Replace the project placeholder tokens in `text`. One left-to-right
/// pass per token; unmatched tokens are left verbatim. Assumed (not
/// guaranteed) idempotent — holds as long as the substituted values do
/// not themselves contain placeholder tokens.
pub fn substitute_variables(text: &str, project: Option<&Project>) -> String {
    let Some(project) = project else {
        return text.to_string();
    };
    let target_ip = project
        .target_ip
        .as_deref()
        .filter(|ip| !ip.is_empty())
        .unwrap_or(project.target.as_str());
    text.replace(TARGET_TOKEN, &project.target)
        .replace(TARGET_IP_TOKEN, target_ip)
        .replace(PROJECT_TOKEN, &project.name)
}
