//! Activation through the filesystem.
//!
//! Each app lives in `<app_root>/<Name>/`. An action is delivered by running
//! that directory's `activate.sh <action>` and reading its stdout. Apps with a
//! run command are launched directly for their role action instead: `start`
//! for ordinary apps, `test` for test apps.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tgo_common::App;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{Action, ActivationChannel};
use crate::environment::Fleet;
use crate::resolver::Resolver;

pub const ACTIVATION_SCRIPT: &str = "activate.sh";

pub const NO_SCRIPT: &str = "error - no activation script";
pub const NO_RUN_TARGET: &str = "error - run command points to non-existent app";

/// Production activation channel.
pub struct ScriptActivator {
    app_root: PathBuf,
}

impl ScriptActivator {
    pub fn new(app_root: impl AsRef<Path>) -> Self {
        let app_root = app_root.as_ref();
        // Child processes run in the app's directory, so every path handed to
        // them must already be absolute.
        let app_root = std::path::absolute(app_root).unwrap_or_else(|_| app_root.to_path_buf());
        Self { app_root }
    }

    pub fn app_dir(&self, app: &App) -> PathBuf {
        self.app_root.join(&app.name)
    }

    /// The action a run command stands in for.
    fn role(app: &App) -> Action {
        if app.is_test { Action::Test } else { Action::Start }
    }

    async fn run_script(&self, app: &App, action: Action) -> String {
        let dir = self.app_dir(app);
        let script = dir.join(ACTIVATION_SCRIPT);
        debug!(script = %script.display(), %action, "activating");
        if !script.exists() {
            warn!(script = %script.display(), "no activation script");
            return NO_SCRIPT.to_string();
        }

        let output = Command::new(&script)
            .arg(action.as_str())
            .current_dir(&dir)
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(out) => {
                if !out.status.success() {
                    warn!(
                        app = %app.name,
                        %action,
                        status = %out.status,
                        stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                        "activation script exited unsuccessfully"
                    );
                }
                String::from_utf8_lossy(&out.stdout).into_owned()
            }
            Err(e) => {
                warn!(script = %script.display(), error = %e, "cannot run activation script");
                format!("error - cannot run activation script: {}", e)
            }
        }
    }

    /// Launch the app's run command in the background and report success as
    /// soon as it has been spawned. Its exit is only logged.
    fn launch_run_cmd(&self, fleet: &Fleet, app: &App) -> String {
        let dir = self.app_dir(app);
        let cmdline = Resolver::new(fleet.env()).resolve(&app.run_cmd);
        let mut parts = cmdline.split_whitespace();
        let Some(program) = parts.next() else {
            return NO_RUN_TARGET.to_string();
        };
        let target = dir.join(program);
        if !target.exists() {
            warn!(app = %app.name, target = %target.display(), "run command target missing");
            return NO_RUN_TARGET.to_string();
        }

        info!(app = %app.name, command = %cmdline, "launching run command");
        let spawned = Command::new(&target)
            .args(parts)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                let name = app.name.clone();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) => info!(app = %name, %status, "run command exited"),
                        Err(e) => warn!(app = %name, error = %e, "lost track of run command"),
                    }
                });
                "OK".to_string()
            }
            Err(e) => {
                warn!(app = %app.name, error = %e, "cannot launch run command");
                format!("error - cannot launch run command: {}", e)
            }
        }
    }
}

#[async_trait]
impl ActivationChannel for ScriptActivator {
    async fn activate(&self, fleet: &Fleet, index: usize, action: Action) -> String {
        let app = fleet.app(index);
        if app.has_run_cmd() && action == Self::role(app) {
            self.launch_run_cmd(fleet, app)
        } else {
            self.run_script(app, action).await
        }
    }

    /// Run the app's resource command to completion inside its directory.
    async fn prepare(&self, fleet: &Fleet, index: usize) -> String {
        let app = fleet.app(index);
        let Some(template) = app.resource_cmd() else {
            return "ok".to_string();
        };
        let dir = self.app_dir(app);
        let cmdline = Resolver::new(fleet.env()).resolve(template);
        let mut parts = cmdline.split_whitespace();
        let Some(program) = parts.next() else {
            return "ok".to_string();
        };
        // Bare names are looked up on PATH, anything with a separator is
        // relative to the app's directory.
        let program = if program.contains('/') {
            dir.join(program)
        } else {
            PathBuf::from(program)
        };

        info!(app = %app.name, command = %cmdline, "preparing app resources");
        let status = Command::new(&program)
            .args(parts)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .status()
            .await;

        match status {
            Ok(s) if s.success() => {
                info!(app = %app.name, "resource command ran, no errors reported");
                "ok".to_string()
            }
            Ok(s) => format!("error - resource command failed: {}", s),
            Err(e) => format!("error - cannot run resource command: {}", e),
        }
    }
}
