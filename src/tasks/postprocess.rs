use regex::{Captures, Regex};
use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(path|parent|name|status|type)\}").expect("valid pattern"));

/// Values substituted into a command template.
#[derive(Debug, Clone)]
pub struct HookContext<'a> {
    pub path: &'a Path,
    pub status: &'a str,
    pub message_type: Option<&'a str>,
}

impl HookContext<'_> {
    fn value(&self, key: &str) -> String {
        match key {
            "path" => std::path::absolute(self.path)
                .unwrap_or_else(|_| self.path.to_path_buf())
                .display()
                .to_string(),
            "parent" => self
                .path
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "name" => self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            "status" => self.status.to_string(),
            "type" => self.message_type.unwrap_or_default().to_string(),
            _ => String::new(),
        }
    }
}

/// An external command run after a file was sent, failed or received.
///
/// The template is split on whitespace first, so a substituted path containing spaces
/// stays a single argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    template: String,
}

impl CommandTemplate {
    /// `None` for a blank template.
    pub fn parse(template: &str) -> Option<Self> {
        let template = template.trim();
        (!template.is_empty()).then(|| Self {
            template: template.to_string(),
        })
    }

    pub fn render(&self, ctx: &HookContext<'_>) -> Vec<String> {
        self.template
            .split_whitespace()
            .map(|arg| {
                PLACEHOLDER
                    .replace_all(arg, |caps: &Captures| ctx.value(&caps[1]))
                    .into_owned()
            })
            .collect()
    }

    /// Starts the command and returns immediately. The child is reaped in the background.
    pub fn spawn(&self, ctx: &HookContext<'_>) {
        let args = self.render(ctx);
        let Some((program, rest)) = args.split_first() else {
            return;
        };

        let child = tokio::process::Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match child {
            Ok(mut child) => {
                let program = program.clone();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if status.success() => {
                            tracing::debug!("Post-process {} finished", program)
                        }
                        Ok(status) => tracing::warn!("Post-process {} exited with {}", program, status),
                        Err(e) => tracing::warn!("Post-process {} could not be awaited: {}", program, e),
                    }
                });
            }
            Err(e) => tracing::warn!("Failed to start post-process {}: {}", program, e),
        }
    }
}

/// Per-pipeline hooks; each is optional.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    pub on_sent: Option<CommandTemplate>,
    pub on_failed: Option<CommandTemplate>,
    pub on_received: Option<CommandTemplate>,
}
