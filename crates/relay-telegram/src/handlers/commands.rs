use teloxide::types::Message;

use relay_core::{
    domain::{ChatId, UserId},
    messaging::types::{InboundEvent, StopRequest},
};

use super::Routed;

const WELCOME: &str = "👋 Hi! Send me a link, or upload a .txt file with one link per line, \
and I will download everything and send it back here. 📥\n\n\
Commands:\n\
/stop - stop your running downloads\n\
/help - show this message";

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub fn route_command(msg: &Message, text: &str) -> Option<Routed> {
    let user = msg.from()?;
    let chat_id = ChatId(msg.chat.id.0);
    let (cmd, _args) = parse_command(text);

    match cmd.as_str() {
        "start" | "help" => Some(Routed::Reply(chat_id, WELCOME.to_string())),
        "stop" => Some(Routed::Event(InboundEvent::StopCommand(StopRequest {
            chat_id,
            user_id: UserId(user.id.0 as i64),
        }))),
        _ => Some(Routed::Reply(
            chat_id,
            format!("Unknown command /{cmd}. Send /help for usage."),
        )),
    }
}
