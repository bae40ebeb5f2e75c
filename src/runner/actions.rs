//! Built-in actions referenced by `uses:` steps
//!
//! Each action expands into a POSIX shell script that runs in the step's
//! working directory. Scripts are run with `-e`, so the first failing
//! command fails the step.

use crate::core::context::RunContext;
use crate::runner::quote::quote_arg;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Errors resolving an action reference
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("Unknown action '{0}' (available: checkout, setup-python, publish-branch)")]
    Unknown(String),
}

/// Actions the runner implements itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinAction {
    /// Check out the repository into the workspace
    Checkout,
    /// Locate a Python interpreter of the requested version
    SetupPython,
    /// Force-push a directory as the sole content of a branch
    PublishBranch,
}

impl fmt::Display for BuiltinAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl BuiltinAction {
    /// Resolve a `uses:` reference such as `actions/checkout@v2`
    pub fn resolve(reference: &str) -> Result<Self, ActionError> {
        let without_version = reference.split('@').next().unwrap_or(reference);
        let name = without_version
            .rsplit('/')
            .next()
            .unwrap_or(without_version)
            .trim()
            .to_ascii_lowercase();

        match name.as_str() {
            "checkout" => Ok(BuiltinAction::Checkout),
            "setup-python" => Ok(BuiltinAction::SetupPython),
            "publish-branch" | "actions-gh-pages" => Ok(BuiltinAction::PublishBranch),
            _ => Err(ActionError::Unknown(reference.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinAction::Checkout => "checkout",
            BuiltinAction::SetupPython => "setup-python",
            BuiltinAction::PublishBranch => "publish-branch",
        }
    }

    /// Inputs that must be present in `with:`
    pub fn required_inputs(&self) -> &'static [&'static str] {
        match self {
            BuiltinAction::Checkout | BuiltinAction::SetupPython => &[],
            BuiltinAction::PublishBranch => &["publish_dir"],
        }
    }

    /// Inputs that may be present in `with:`
    pub fn optional_inputs(&self) -> &'static [&'static str] {
        match self {
            BuiltinAction::Checkout => &["repository", "ref", "fetch-depth"],
            BuiltinAction::SetupPython => &["python-version"],
            BuiltinAction::PublishBranch => &[
                "publish_branch",
                "remote",
                "commit_message",
                "user_name",
                "user_email",
            ],
        }
    }

    pub fn accepts_input(&self, name: &str) -> bool {
        self.required_inputs().contains(&name) || self.optional_inputs().contains(&name)
    }

    /// Expand the action into a shell script
    ///
    /// `inputs` must already have every expression rendered.
    pub fn script(&self, inputs: &HashMap<String, String>, context: &RunContext) -> String {
        match self {
            BuiltinAction::Checkout => checkout_script(inputs, context),
            BuiltinAction::SetupPython => setup_python_script(inputs),
            BuiltinAction::PublishBranch => publish_script(inputs, context),
        }
    }
}

fn input<'a>(inputs: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    inputs
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

fn checkout_script(inputs: &HashMap<String, String>, context: &RunContext) -> String {
    let git_ref = input(inputs, "ref")
        .or_else(|| context.trigger.branch())
        .unwrap_or(&context.trigger.git_ref);
    let git_ref = quote_arg(git_ref);

    // fetch-depth 0 means full history
    let depth = match input(inputs, "fetch-depth") {
        Some("0") => String::new(),
        Some(depth) => format!(" --depth {}", quote_arg(depth)),
        None => " --depth 1".to_string(),
    };

    // --force below would discard local edits, so a dirty tree stops the step
    let fetch = format!(
        r#"  if [ -n "$(git status --porcelain --untracked-files=no)" ]; then
    echo "Refusing to check out over uncommitted changes:" >&2
    git status --short --untracked-files=no >&2
    exit 1
  fi
  git fetch --quiet{depth} origin {git_ref}
  git checkout --quiet --force FETCH_HEAD"#,
        depth = depth,
        git_ref = git_ref
    );

    let body = match input(inputs, "repository") {
        Some(repository) => format!(
            "if [ -d .git ]; then\n{fetch}\nelse\n  git clone --quiet{depth} --branch {git_ref} {repository} .\nfi",
            fetch = fetch,
            depth = depth,
            git_ref = git_ref,
            repository = quote_arg(repository)
        ),
        None => format!(
            "git rev-parse --is-inside-work-tree > /dev/null\n\
             if git remote get-url origin > /dev/null 2>&1; then\n{fetch}\nelse\n  echo \"No origin remote, using local work tree\"\nfi",
            fetch = fetch
        ),
    };

    format!("{}\ngit log -1 --format='Checked out %H'\n", body)
}

fn setup_python_script(inputs: &HashMap<String, String>) -> String {
    let version = input(inputs, "python-version").unwrap_or("3");
    let prefix = version
        .trim()
        .trim_end_matches(".x")
        .trim_end_matches(".*");
    let prefix = quote_arg(prefix);

    format!(
        r#"PYTHON=$(command -v python3 || command -v python || true)
if [ -z "$PYTHON" ]; then
  echo "python is not installed" >&2
  exit 1
fi
VERSION=$("$PYTHON" -c 'import platform; print(platform.python_version())')
case "$VERSION" in
  {prefix}|{prefix}.*) echo "Using $PYTHON ($VERSION)" ;;
  *) echo "python $VERSION does not satisfy "{version} >&2; exit 1 ;;
esac
"#,
        prefix = prefix,
        version = quote_arg(version)
    )
}

fn publish_script(inputs: &HashMap<String, String>, context: &RunContext) -> String {
    let publish_dir = input(inputs, "publish_dir").unwrap_or(".");
    let branch = quote_arg(input(inputs, "publish_branch").unwrap_or("gh-pages"));

    let default_message = format!(
        "Deploy {}",
        context
            .trigger
            .sha
            .as_deref()
            .unwrap_or(&context.trigger.git_ref)
    );
    let message = input(inputs, "commit_message").unwrap_or(&default_message);
    let user_name = input(inputs, "user_name").unwrap_or("pipeline-runner");
    let user_email = input(inputs, "user_email").unwrap_or("pipeline-runner@localhost");

    let remote = match input(inputs, "remote") {
        Some(remote) => format!("REMOTE={}", quote_arg(remote)),
        None => "REMOTE=$(git remote get-url origin)".to_string(),
    };

    format!(
        r#"SRC=$(cd {publish_dir} && pwd)
{remote}
case "$REMOTE" in
  /*|*://*|*@*:*) ;;
  *) if [ -e "$REMOTE" ]; then REMOTE=$(cd "$REMOTE" && pwd); fi ;;
esac
if [ -n "${{PUBLISH_TOKEN:-}}" ]; then
  case "$REMOTE" in
    https://*) REMOTE="https://x-access-token:${{PUBLISH_TOKEN}}@${{REMOTE#https://}}" ;;
  esac
fi
STAGE=$(mktemp -d)
trap 'rm -rf "$STAGE"' EXIT
cp -R "$SRC"/. "$STAGE"/
rm -rf "$STAGE/.git"
cd "$STAGE"
git init --quiet
git symbolic-ref HEAD refs/heads/{branch}
git add --all
git -c user.name={user_name} -c user.email={user_email} commit --quiet --allow-empty -m {message}
git push --quiet --force "$REMOTE" HEAD:refs/heads/{branch}
echo "Published $(git ls-files | wc -l | tr -d ' ') files to "{branch}
"#,
        publish_dir = quote_arg(publish_dir),
        remote = remote,
        branch = branch,
        user_name = quote_arg(user_name),
        user_email = quote_arg(user_email),
        message = quote_arg(message),
    )
}
