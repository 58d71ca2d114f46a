//! String template rendering utilities.

pub struct TemplateVars;

impl TemplateVars {
    pub const OUTPUT_DIR: &'static str = "output_dir";
    pub const ARTIFACTS: &'static str = "artifacts";
    pub const PROJECT_DIR: &'static str = "project_dir";
    pub const PACKAGE_NAME: &'static str = "package_name";
    pub const PACKAGE_VERSION: &'static str = "package_version";
}

pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

pub fn is_present(template: &str, key: &str) -> bool {
    let placeholder = format!("{{{{{}}}}}", key);
    template.contains(&placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_all_occurrences() {
        let out = render(
            "python -m build --outdir {{output_dir}} && ls {{output_dir}}",
            &[(TemplateVars::OUTPUT_DIR, "dist")],
        );
        assert_eq!(out, "python -m build --outdir dist && ls dist");
    }

    #[test]
    fn render_leaves_unknown_placeholders() {
        assert_eq!(render("echo {{other}}", &[("artifacts", "x")]), "echo {{other}}");
    }

    #[test]
    fn is_present_detects_placeholder() {
        assert!(is_present("twine upload {{artifacts}}", TemplateVars::ARTIFACTS));
        assert!(!is_present("twine upload dist/*", TemplateVars::ARTIFACTS));
    }
}
