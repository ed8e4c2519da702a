//! Environment contract between a launcher and the child it spawns.
//!
//! A launched component discovers its own identity and, in socket-bridge
//! mode, the port it is expected to use by reading these variables from its
//! initial environment. They must therefore be set on the `Command` before
//! the child is spawned; the child inherits the environment at spawn time and
//! never re-reads it.

use tokio::process::Command;

/// Identity name published to the child (e.g. the tool name being launched).
pub const TEKTON_NAME: &str = "TEKTON_NAME";

/// Port number published to the child in socket-bridge mode.
pub const TEKTON_PORT: &str = "TEKTON_PORT";

/// Apply the child-environment contract to a command before spawning.
///
/// Only the variables with a value are set; the rest of the parent
/// environment is inherited unchanged so the child still sees `PATH`,
/// `HOME`, and friends.
pub fn apply_child_env(cmd: &mut Command, tool_name: Option<&str>, port: Option<u16>) {
    if let Some(name) = tool_name {
        cmd.env(TEKTON_NAME, name);
    }
    if let Some(port) = port {
        cmd.env(TEKTON_PORT, port.to_string());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn child_sees_published_identity() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("printf '%s:%s' \"$TEKTON_NAME\" \"$TEKTON_PORT\"");
        apply_child_env(&mut cmd, Some("ergon"), Some(45001));

        let out = cmd.output().await.unwrap();
        assert_eq!(out.stdout, b"ergon:45001");
    }

    #[tokio::test]
    async fn unset_values_are_not_published() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("printf '%s' \"${TEKTON_PORT-unset}\"");
        cmd.env_remove(TEKTON_PORT);
        apply_child_env(&mut cmd, Some("ergon"), None);

        let out = cmd.output().await.unwrap();
        assert_eq!(out.stdout, b"unset");
    }
}
