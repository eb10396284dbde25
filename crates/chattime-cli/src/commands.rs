//! REPL command parsing and dispatch
//!
//! Maps prompt lines onto engine operations. Client and operator commands
//! share one prompt; engine errors are printed, never fatal to the loop.

use std::sync::Arc;

use chattime_engine::{ChatEngine, ChattimeResult, StopReason, TopUpId, UserId};

/// Outcome of one dispatched line
pub enum Flow {
    Continue,
    Quit,
}

pub const HELP: &str = "\
client commands:
  status                       show session and wallet state
  topup <amount> <reference>   submit a top-up request
  topups                       list own top-up requests
  start                        start a chat session
  stop                         stop the chat session
  send <text>                  send a chat message
  history                      print the current chat transcript
  clear                        delete the chat transcript
  rate <stars> [feedback]      rate the last session (1-5)
operator commands:
  pending                      list top-ups awaiting resolution
  approve <id>                 approve a top-up
  reject <id> [reason]         reject a top-up
  reply <text>                 reply to the demo user
  end                          force-stop the demo user's session
other:
  help                         this text
  quit                         stop all sessions and exit";

/// Execute one prompt line against the engine
pub async fn dispatch(engine: &Arc<ChatEngine>, user_id: UserId, line: &str) -> Flow {
    let line = line.trim();
    if line.is_empty() {
        return Flow::Continue;
    }
    let mut parts = line.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or("").trim();

    match command {
        "help" => println!("{HELP}"),
        "quit" | "exit" => return Flow::Quit,
        "status" => report(engine.session_status(user_id).await.map(|status| {
            format!(
                "active={} session={} balance={}",
                status.active,
                status
                    .session_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                status.balance
            )
        })),
        "topup" => {
            let mut args = rest.splitn(2, char::is_whitespace);
            match (args.next().and_then(|a| a.parse::<u64>().ok()), args.next()) {
                (Some(amount), Some(reference)) => report(
                    engine
                        .submit_top_up(user_id, amount, reference.trim(), None)
                        .await
                        .map(|request| format!("submitted top-up {}", request.id)),
                ),
                _ => println!("usage: topup <amount> <reference>"),
            }
        }
        "topups" => report(engine.top_ups_for(user_id).await.map(|requests| {
            requests
                .iter()
                .map(|r| format!("{} amount={} status={}", r.id, r.amount, r.status))
                .collect::<Vec<_>>()
                .join("\n")
        })),
        "start" => report(
            engine
                .start_session(user_id)
                .await
                .map(|id| format!("session {id} started")),
        ),
        "stop" => report(
            engine
                .stop_session(user_id, StopReason::ClientRequested)
                .await
                .map(|()| "session stopped".to_string()),
        ),
        "send" => report(
            engine
                .send_client_message(user_id, rest)
                .await
                .map(|message| format!("sent at {}", message.created_at)),
        ),
        "history" => report(engine.chat_history(user_id).await.map(|messages| {
            messages
                .iter()
                .map(|m| format!("[{}] {}: {}", m.created_at, m.sender, m.text))
                .collect::<Vec<_>>()
                .join("\n")
        })),
        "clear" => report(
            engine
                .clear_chat(user_id)
                .await
                .map(|id| format!("cleared transcript of session {id}")),
        ),
        "rate" => {
            let mut args = rest.splitn(2, char::is_whitespace);
            match args.next().and_then(|a| a.parse::<u8>().ok()) {
                Some(stars) => {
                    let feedback = args.next().map(|s| s.trim().to_string());
                    report(
                        engine
                            .submit_rating(user_id, stars, feedback)
                            .await
                            .map(|rating| format!("rated session {}", rating.session_id)),
                    );
                }
                None => println!("usage: rate <stars 1-5> [feedback]"),
            }
        }
        "pending" => report(engine.pending_top_ups().await.map(|requests| {
            requests
                .iter()
                .map(|r| format!("{} user={} amount={} ref={}", r.id, r.user_id, r.amount, r.reference))
                .collect::<Vec<_>>()
                .join("\n")
        })),
        "approve" => match rest.parse::<TopUpId>() {
            Ok(id) => report(
                engine
                    .approve_top_up(id)
                    .await
                    .map(|request| format!("approved, credited {}", request.amount)),
            ),
            Err(e) => println!("error: {e}"),
        },
        "reject" => {
            let mut args = rest.splitn(2, char::is_whitespace);
            match args.next().unwrap_or("").parse::<TopUpId>() {
                Ok(id) => {
                    let reason = args.next().map(|s| s.trim().to_string());
                    report(
                        engine
                            .reject_top_up(id, reason)
                            .await
                            .map(|request| {
                                format!(
                                    "rejected: {}",
                                    request.reason.unwrap_or_default()
                                )
                            }),
                    );
                }
                Err(e) => println!("error: {e}"),
            }
        }
        "reply" => report(
            engine
                .send_admin_message(user_id, rest)
                .await
                .map(|message| format!("replied at {}", message.created_at)),
        ),
        "end" => report(
            engine
                .stop_session(user_id, StopReason::AdminCleared)
                .await
                .map(|()| "session force-stopped".to_string()),
        ),
        other => println!("unknown command '{other}', try 'help'"),
    }
    Flow::Continue
}

fn report(result: ChattimeResult<String>) {
    match result {
        Ok(text) if text.is_empty() => println!("(none)"),
        Ok(text) => println!("{text}"),
        Err(e) => println!("error: {e}"),
    }
}
