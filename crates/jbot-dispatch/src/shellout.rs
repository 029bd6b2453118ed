//! Per-command-body shell-out watchdog (spec §5): any command that shells
//! out to a tool is killed after [`TIMEOUT_SECS`] and its output replaced by
//! a notice, rather than letting the receive loop block indefinitely.
//!
//! Structurally grounded in the teacher's `skynet-terminal::manager::exec`:
//! race a `tokio::time::timeout` against `Child::wait_with_output` on a
//! spawned task, and SIGKILL the child by raw pid on expiry since the
//! `Child` handle itself was moved into that task.

use tokio::process::Command;

use jbot_core::config::SHELLOUT_TIMEOUT_SECS as TIMEOUT_SECS;

/// Run `command` through `sh -c`, capturing combined stdout (stderr is
/// discarded, matching the original's command bodies which write their own
/// error text to stdout for the chat reply).
pub async fn run(command: &str) -> String {
    let timeout = std::time::Duration::from_secs(TIMEOUT_SECS);

    let child = match Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => return format!("Unable to run command: {e}"),
    };

    let pid = child.id();
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let _ = tx.send(child.wait_with_output().await);
    });

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(Ok(output))) => {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            if !output.status.success() {
                text.push_str(&String::from_utf8_lossy(&output.stderr));
            }
            text
        }
        Ok(Ok(Err(e))) => format!("Unable to run command: {e}"),
        Ok(Err(_)) => "Unable to run command: the worker task panicked".to_string(),
        Err(_) => {
            if let Some(raw_pid) = pid {
                #[cfg(unix)]
                unsafe {
                    libc::kill(raw_pid as libc::pid_t, libc::SIGKILL);
                }
            }
            "Sorry, had to kill your command after it ran too long.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let out = run("echo hi").await;
        assert_eq!(out.trim(), "hi");
    }

    #[tokio::test]
    async fn nonexistent_binary_reports_unable() {
        let out = run("definitely-not-a-real-binary-xyz").await;
        assert!(out.contains("Unable") || out.contains("not found") || out.contains("command not found"));
    }
}
