//! `extension init`: create a new extension project from a template.

use std::path::{Path, PathBuf};
use std::process::Command;

use clap::ValueEnum;
use tracing::debug;

use crate::error::ScaffoldError;
use crate::publish::MANIFEST_FILE;

/// Kind of extension to generate; decides the manifest action type and the
/// starter script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExtensionTemplate {
    /// Opens a dialog rendered by the extension.
    Dialog,
    /// Runs a script without showing UI.
    Action,
    /// Executes immediately when the button is clicked.
    Instant,
}

impl ExtensionTemplate {
    pub const ALL: [ExtensionTemplate; 3] = [
        ExtensionTemplate::Dialog,
        ExtensionTemplate::Action,
        ExtensionTemplate::Instant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExtensionTemplate::Dialog => "dialog",
            ExtensionTemplate::Action => "action",
            ExtensionTemplate::Instant => "instant",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ExtensionTemplate::Dialog => "dialog - show your own UI in a dialog",
            ExtensionTemplate::Action => "action - run a script in the background",
            ExtensionTemplate::Instant => "instant - run immediately on click",
        }
    }

    fn index_js(self) -> &'static str {
        match self {
            ExtensionTemplate::Dialog => DIALOG_INDEX_JS,
            ExtensionTemplate::Action => ACTION_INDEX_JS,
            ExtensionTemplate::Instant => INSTANT_INDEX_JS,
        }
    }
}

const DIALOG_INDEX_JS: &str = r#"import { ui, dialog } from '@elfsquad/custom-scripting';

const reloadButton = document.createElement('button');
reloadButton.textContent = 'Reload';
reloadButton.addEventListener('click', () => {
  ui.reload();
});

const closeButton = document.createElement('button');
closeButton.textContent = 'Close';
closeButton.addEventListener('click', () => {
  dialog.close();
});

document.body.appendChild(reloadButton);
document.body.appendChild(closeButton);
"#;

const ACTION_INDEX_JS: &str = r#"import { ui } from '@elfsquad/custom-scripting';

console.log('Running action');
ui.reload();
"#;

const INSTANT_INDEX_JS: &str = r#"import { ui } from '@elfsquad/custom-scripting';

console.log('Instant action triggered');
ui.reload();
"#;

const GITIGNORE: &str = "node_modules/\ndist/\n";

fn package_json(name: &str) -> String {
    let manifest = serde_json::json!({
        "name": name,
        "version": "0.1.0",
        "private": true,
        "type": "module",
        "scripts": {
            "build": "esbuild src/index.js --bundle --minify --format=esm --outfile=dist/index.js"
        },
        "dependencies": {
            "@elfsquad/custom-scripting": "latest"
        },
        "devDependencies": {
            "esbuild": "^0.20.0"
        }
    });
    format!("{:#}\n", manifest)
}

fn manifest_yml(name: &str, template: ExtensionTemplate) -> String {
    format!(
        r#"name: "{name}"

buttons:
- name: "{name}"
  actions:
  - type: "{kind}"
    entrypoint: "index.js"
"#,
        kind = template.as_str()
    )
}

fn validate_name(name: &str) -> Result<(), ScaffoldError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if invalid {
        return Err(ScaffoldError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Create `<parent>/<name>` with the template files and return the paths
/// written, in creation order.
pub fn scaffold(parent: &Path, name: &str, template: ExtensionTemplate) -> Result<Vec<PathBuf>, ScaffoldError> {
    validate_name(name)?;
    let root = parent.join(name);
    if root.exists() {
        return Err(ScaffoldError::AlreadyExists(root));
    }

    std::fs::create_dir_all(root.join("src"))?;
    let files = [
        (root.join("package.json"), package_json(name)),
        (root.join("src").join("index.js"), template.index_js().to_string()),
        (root.join(MANIFEST_FILE), manifest_yml(name, template)),
        (root.join(".gitignore"), GITIGNORE.to_string()),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (path, contents) in files {
        std::fs::write(&path, contents)?;
        debug!(path = %path.display(), "created");
        written.push(path);
    }
    Ok(written)
}

/// Run `npm install` in the new project.
pub fn install_dependencies(root: &Path) -> std::io::Result<std::process::ExitStatus> {
    let npm = if cfg!(windows) { "npm.cmd" } else { "npm" };
    Command::new(npm).arg("install").current_dir(root).status()
}
