//! Guard rules that take over when the foreground is a system dialog or not
//! the app under test at all.

use crate::errors::MonkeyError;
use crate::log::ActionKind;
use crate::node::UiNode;
use crate::pass::PassContext;
use crate::platforms::GlobalAction;
use crate::policy::click;
use crate::query::AttributeQuery;
use crate::search::search;
use tracing::{debug, info, instrument, warn};

pub const PLATFORM_PACKAGE: &str = "android";
pub const PACKAGE_INSTALLER_PACKAGE: &str = "com.android.packageinstaller";

/// What a dialog rule does when the button is missing or ambiguous
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMismatch {
    FallThrough,
    Consume,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCaseRule {
    /// Clicks the only node labelled `button` while `package` is in front
    Dialog {
        name: String,
        package: String,
        button: String,
        on_mismatch: OnMismatch,
    },
    /// The launcher is in front: bring the app under test back
    LauncherForeground,
    /// Any other package is in front: press back
    ForeignPackage,
}

impl SpecialCaseRule {
    pub fn dialog(name: &str, package: &str, button: &str, on_mismatch: OnMismatch) -> Self {
        SpecialCaseRule::Dialog {
            name: name.to_string(),
            package: package.to_string(),
            button: button.to_string(),
            on_mismatch,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SpecialCaseRule::Dialog { name, .. } => name,
            SpecialCaseRule::LauncherForeground => "launcher foreground",
            SpecialCaseRule::ForeignPackage => "wrong foreground package",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    NotApplicable,
    Handled { rule: String },
}

impl RuleOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, RuleOutcome::Handled { .. })
    }
}

/// Ordered rule list; the first rule that handles a snapshot wins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialCaseRules {
    rules: Vec<SpecialCaseRule>,
}

impl Default for SpecialCaseRules {
    fn default() -> Self {
        Self::new(vec![
            SpecialCaseRule::dialog(
                "uninstall confirm",
                PLATFORM_PACKAGE,
                "OK",
                OnMismatch::FallThrough,
            ),
            SpecialCaseRule::dialog(
                "full-screen notice",
                PLATFORM_PACKAGE,
                "Got it",
                OnMismatch::FallThrough,
            ),
            SpecialCaseRule::dialog(
                "app not responding",
                PLATFORM_PACKAGE,
                "Wait",
                OnMismatch::FallThrough,
            ),
            // Consumes the event even without a unique button so an unknown
            // permission dialog is not clicked through by the policy
            SpecialCaseRule::dialog(
                "permission request",
                PACKAGE_INSTALLER_PACKAGE,
                "ALLOW",
                OnMismatch::Consume,
            ),
            SpecialCaseRule::LauncherForeground,
            SpecialCaseRule::ForeignPackage,
        ])
    }
}

impl SpecialCaseRules {
    pub fn new(rules: Vec<SpecialCaseRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[SpecialCaseRule] {
        &self.rules
    }

    /// Runs the rules against `root`.
    ///
    /// Fails only when the app under test cannot be launched.
    #[instrument(level = "debug", skip(self, ctx, root))]
    pub fn apply(
        &self,
        ctx: &mut PassContext<'_>,
        root: &UiNode,
    ) -> Result<RuleOutcome, MonkeyError> {
        let foreground = root.package_name();

        for rule in &self.rules {
            let handled = match rule {
                SpecialCaseRule::Dialog {
                    name,
                    package,
                    button,
                    on_mismatch,
                } => {
                    if foreground != *package {
                        continue;
                    }
                    let matches = search(Some(root), &AttributeQuery::text(button.as_str()));
                    if let [target] = matches.as_slice() {
                        info!(rule = %name, %button, "Dismissing system dialog");
                        click(ctx, target);
                        true
                    } else {
                        warn!(
                            rule = %name,
                            %button,
                            count = matches.len(),
                            "Expected exactly one matching button"
                        );
                        *on_mismatch == OnMismatch::Consume
                    }
                }
                SpecialCaseRule::LauncherForeground => {
                    if foreground != ctx.config.launcher_package_name {
                        continue;
                    }
                    let config = ctx.config;
                    let package = config.package_name.as_str();
                    info!(package, "Launcher in foreground, relaunching app");
                    ctx.record(ActionKind::Launch, package, "");
                    ctx.provider
                        .launch_app(package)
                        .map_err(|e| MonkeyError::LaunchFailed(format!("{package}: {e}")))?;
                    true
                }
                SpecialCaseRule::ForeignPackage => {
                    if foreground == ctx.config.package_name {
                        continue;
                    }
                    info!(%foreground, "Foreground is not the target app, pressing back");
                    ctx.record(ActionKind::Back, "", "");
                    if let Err(e) = ctx.provider.global_action(GlobalAction::Back) {
                        warn!(error = %e, "Back failed");
                    }
                    true
                }
            };

            if handled {
                return Ok(RuleOutcome::Handled {
                    rule: rule.name().to_string(),
                });
            }
        }

        debug!(%foreground, "No special case");
        Ok(RuleOutcome::NotApplicable)
    }
}
