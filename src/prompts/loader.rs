use std::path::{Path, PathBuf};
use regex::Regex;
use crate::errors::QuorumError;
use tracing::{debug, warn};

/// Variables available for template interpolation in prompt files.
#[derive(Debug, Clone, Default)]
pub struct PromptVariables {
    pub contract_name: String,
    pub tier: String,
    pub analysis_depth: String,
    pub source_code: String,
    pub scope: Option<String>,
    pub focus: Option<String>,
    pub agent_findings: Option<String>,
    pub agent_count: Option<String>,
    pub omitted_sections: Option<String>,
}

/// Templates compiled into the binary, used when the prompts directory lacks a file.
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("audit.txt", include_str!("../../prompts/audit.txt")),
    ("supervisor.txt", include_str!("../../prompts/supervisor.txt")),
    ("system-auditor.txt", include_str!("../../prompts/system-auditor.txt")),
    ("system-supervisor.txt", include_str!("../../prompts/system-supervisor.txt")),
    ("shared/_output-schema.txt", include_str!("../../prompts/shared/_output-schema.txt")),
    ("shared/_supervisor-schema.txt", include_str!("../../prompts/shared/_supervisor-schema.txt")),
    ("shared/_severity-guide.txt", include_str!("../../prompts/shared/_severity-guide.txt")),
];

/// Loads and processes prompt template files with include directives and variable interpolation.
pub struct PromptLoader {
    prompts_dir: Option<PathBuf>,
}

const MAX_INCLUDE_DEPTH: u8 = 5;

impl PromptLoader {
    pub fn new(prompts_dir: PathBuf) -> Self {
        debug!(dir = %prompts_dir.display(), "PromptLoader initialized");
        Self { prompts_dir: Some(prompts_dir) }
    }

    /// Loader that only serves the compiled-in templates.
    pub fn builtin() -> Self {
        Self { prompts_dir: None }
    }

    /// Load a prompt template by name (without .txt extension), processing @include directives.
    pub fn load(&self, prompt_name: &str) -> Result<String, QuorumError> {
        let content = self.read(&format!("{}.txt", prompt_name))?;
        self.process_includes(&content, 0)
    }

    /// Like [`PromptLoader::load`], but a broken or missing file on disk falls back
    /// to the compiled-in template of the same name.
    pub fn load_or_builtin(&self, prompt_name: &str) -> Result<String, QuorumError> {
        match self.load(prompt_name) {
            Ok(content) => Ok(content),
            Err(e) if self.prompts_dir.is_some() => {
                warn!(prompt = prompt_name, error = %e, "Falling back to built-in prompt");
                Self::builtin().load(prompt_name)
            }
            Err(e) => Err(e),
        }
    }

    fn read(&self, relative: &str) -> Result<String, QuorumError> {
        if let Some(dir) = &self.prompts_dir {
            let file_path = dir.join(relative);
            if file_path.exists() {
                return std::fs::read_to_string(&file_path).map_err(|e| {
                    QuorumError::Prompt(format!("Failed to read prompt {}: {}", file_path.display(), e))
                });
            }
        }
        BUILTIN_TEMPLATES
            .iter()
            .find(|(name, _)| *name == relative)
            .map(|(_, content)| content.to_string())
            .ok_or_else(|| QuorumError::Prompt(format!("Prompt file not found: {}", relative)))
    }

    /// Replace {{VARIABLE}} placeholders with values from PromptVariables.
    /// None values become empty string.
    pub fn interpolate(&self, template: &str, vars: &PromptVariables) -> String {
        let mut result = template.to_string();

        let replacements: &[(&str, &str)] = &[
            ("{{CONTRACT_NAME}}", &vars.contract_name),
            ("{{TIER}}", &vars.tier),
            ("{{ANALYSIS_DEPTH}}", &vars.analysis_depth),
        ];
        for (placeholder, value) in replacements {
            result = result.replace(placeholder, value);
        }

        let optional_replacements: &[(&str, &Option<String>)] = &[
            ("{{SCOPE}}", &vars.scope),
            ("{{FOCUS}}", &vars.focus),
            ("{{AGENT_FINDINGS}}", &vars.agent_findings),
            ("{{AGENT_COUNT}}", &vars.agent_count),
            ("{{OMITTED_SECTIONS}}", &vars.omitted_sections),
        ];
        for (placeholder, value) in optional_replacements {
            let replacement = value.as_deref().unwrap_or("");
            result = result.replace(placeholder, replacement);
        }

        // Source last, so placeholders that happen to appear inside contract code stay untouched.
        result.replace("{{SOURCE_CODE}}", &vars.source_code)
    }

    /// Process @include(path) directives recursively with depth limit.
    fn process_includes(&self, content: &str, depth: u8) -> Result<String, QuorumError> {
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(QuorumError::Prompt(format!(
                "Include depth limit ({}) exceeded, possible circular include",
                MAX_INCLUDE_DEPTH
            )));
        }

        let include_re = Regex::new(r"@include\(([^)]+)\)")
            .map_err(|e| QuorumError::Internal(e.to_string()))?;
        let mut result = content.to_string();

        let matches: Vec<(String, String)> = include_re
            .captures_iter(content)
            .map(|cap| (cap[0].to_string(), cap[1].trim().to_string()))
            .collect();

        for (full_match, include_path) in matches {
            let included_content = self.read(&include_path).map_err(|e| {
                QuorumError::Prompt(format!("{} (referenced as @include({}))", e, include_path))
            })?;
            let processed = self.process_includes(&included_content, depth + 1)?;
            result = result.replace(&full_match, &processed);
        }

        Ok(result)
    }

    /// Check if a prompt template is available on disk or built in.
    pub fn has_prompt(&self, prompt_name: &str) -> bool {
        self.read(&format!("{}.txt", prompt_name)).is_ok()
    }

    pub fn prompts_dir(&self) -> Option<&Path> {
        self.prompts_dir.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup_test_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();

        fs::create_dir_all(dir.path().join("shared")).unwrap();
        fs::write(
            dir.path().join("shared/_target.txt"),
            "Contract: {{CONTRACT_NAME}}",
        )
        .unwrap();
        fs::write(
            dir.path().join("test-prompt.txt"),
            "<target>\n@include(shared/_target.txt)\n</target>\n\nAudit at {{ANALYSIS_DEPTH}} depth.",
        )
        .unwrap();
        fs::write(dir.path().join("loop.txt"), "@include(loop.txt)").unwrap();
        fs::write(dir.path().join("audit.txt"), "@include(shared/missing.txt)").unwrap();

        dir
    }

    #[test]
    fn test_load_with_includes() {
        let dir = setup_test_dir();
        let loader = PromptLoader::new(dir.path().to_path_buf());
        let content = loader.load("test-prompt").unwrap();
        assert!(content.contains("Contract: {{CONTRACT_NAME}}"));
        assert!(!content.contains("@include"));
    }

    #[test]
    fn test_interpolate_leaves_source_placeholders() {
        let loader = PromptLoader::builtin();
        let vars = PromptVariables {
            contract_name: "Vault".to_string(),
            analysis_depth: "deep".to_string(),
            source_code: "// {{TIER}} in a comment".to_string(),
            ..Default::default()
        };
        let result = loader.interpolate("{{CONTRACT_NAME}}/{{ANALYSIS_DEPTH}}/{{FOCUS}}\n{{SOURCE_CODE}}", &vars);
        assert_eq!(result, "Vault/deep/\n// {{TIER}} in a comment");
    }

    #[test]
    fn test_circular_include_is_bounded() {
        let dir = setup_test_dir();
        let loader = PromptLoader::new(dir.path().to_path_buf());
        let err = loader.load("loop").unwrap_err();
        assert!(err.to_string().contains("depth limit"));
    }

    #[test]
    fn test_broken_disk_template_falls_back_to_builtin() {
        let dir = setup_test_dir();
        let loader = PromptLoader::new(dir.path().to_path_buf());
        assert!(loader.load("audit").is_err());
        let content = loader.load_or_builtin("audit").unwrap();
        assert!(content.contains("{{SOURCE_CODE}}"));
        assert!(!content.contains("@include"));
    }

    #[test]
    fn test_builtin_templates_resolve() {
        let loader = PromptLoader::builtin();
        for name in ["audit", "supervisor", "system-auditor", "system-supervisor"] {
            assert!(loader.load(name).is_ok(), "{} failed to load", name);
        }
        assert!(!loader.has_prompt("nonexistent"));
    }
}
