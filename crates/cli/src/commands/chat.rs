use std::future::{self, Future};
use std::io;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};
use uuid::Uuid;

use switchboard_agent::Agent;
use switchboard_core::config::{AppConfig, LoadOptions};
use switchboard_core::ApplicationError;

use super::memory::render_snapshot;
use super::{runtime, CommandResult};
use crate::bootstrap::{bootstrap, init_logging, BootstrapError};

pub const BANNER: &str = "\nSwitchboard Multi-Agent Chat\n\n\
    请输入问题, 我将路由到匹配的 Agent 来回答：\nType 'exit' to quit.\n";
pub const PROMPT: &str = "\n> ";
pub const RESPONSE_HEADER: &str = "\n[Router] Response ->\n";

pub fn run(options: LoadOptions, show_memory: bool) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), 2)
        }
    };
    init_logging(&config.logging);

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure("chat", "runtime", error.to_string(), 1);
        }
    };

    let result = runtime.block_on(serve(config, show_memory));
    // The stdin reader thread may still be parked on a read.
    runtime.shutdown_background();

    match result {
        Ok(()) => CommandResult { exit_code: 0, output: String::new() },
        Err(error) if error.downcast_ref::<BootstrapError>().is_some() => {
            CommandResult::failure("chat", "bootstrap", format!("{error:#}"), 3)
        }
        Err(error) => CommandResult::failure("chat", "io", format!("{error:#}"), 1),
    }
}

async fn serve(config: AppConfig, show_memory: bool) -> anyhow::Result<()> {
    let app = bootstrap(config).await?;

    let mut stdout = tokio::io::stdout();
    if show_memory {
        let snapshot = match &app.memory_hook {
            Some(hook) => {
                let memory = &app.config.memory;
                render_snapshot(hook, &memory.actor_id, &memory.session_id).await
            }
            None => "memory is disabled for this session\n".to_string(),
        };
        stdout.write_all(snapshot.as_bytes()).await.context("could not print memory snapshot")?;
    }

    let mut router = app.into_router();
    let stdin = BufReader::new(tokio::io::stdin());
    run_session(&mut router, stdin, &mut stdout, interrupted())
        .await
        .context("chat session failed")?;
    Ok(())
}

/// Resolves on the first Ctrl-C. Never resolves when the signal handler
/// cannot be installed.
async fn interrupted() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(event_name = "chat.signal.unavailable", error = %error, "cannot listen for ctrl-c");
        future::pending::<()>().await;
    }
}

/// Reads one query per line and prints the router's reply. Ends on `exit`
/// (any case), end of input or when `shutdown` resolves, including while a
/// turn is in flight. Blank lines are skipped. Failed turns are reported and
/// the loop keeps going.
pub async fn run_session<R, W, S>(
    router: &mut Agent,
    input: R,
    output: &mut W,
    shutdown: S,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    info!(event_name = "chat.session.start", "starting chat session");
    output.write_all(BANNER.as_bytes()).await?;

    tokio::pin!(shutdown);
    let mut lines = input.lines();
    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => {
                info!(event_name = "chat.session.interrupted", "execution interrupted by user");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") {
            break;
        }

        let outcome = tokio::select! {
            outcome = router.invoke(&line) => outcome,
            _ = &mut shutdown => {
                info!(event_name = "chat.session.interrupted", "turn interrupted by user");
                break;
            }
        };
        match outcome {
            Ok(reply) => {
                output.write_all(RESPONSE_HEADER.as_bytes()).await?;
                output.write_all(reply.as_bytes()).await?;
                output.write_all(b"\n").await?;
            }
            Err(failure) => {
                let correlation_id = Uuid::new_v4().to_string();
                error!(
                    event_name = "chat.turn.failed",
                    correlation_id = %correlation_id,
                    error = %failure,
                    "an error occurred"
                );
                let interface = ApplicationError::Integration(failure.to_string())
                    .into_interface(correlation_id.clone());
                let notice = format!(
                    "\nAn error occurred: {} (correlation id: {correlation_id})\n",
                    interface.user_message()
                );
                output.write_all(notice.as_bytes()).await?;
            }
        }
    }

    output.write_all(b"\n").await?;
    output.flush().await?;
    info!(event_name = "chat.session.end", "chat session ended");
    Ok(())
}
