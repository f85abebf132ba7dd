use teloxide::types::Message;

use relay_core::{
    domain::{ChatId, UserId},
    messaging::types::{InboundEvent, TextMessage},
};

use super::Routed;

pub fn route_text(msg: &Message, text: &str) -> Option<Routed> {
    let user = msg.from()?;
    if text.trim().is_empty() {
        return None;
    }
    Some(Routed::Event(InboundEvent::Text(TextMessage {
        chat_id: ChatId(msg.chat.id.0),
        user_id: UserId(user.id.0 as i64),
        text: text.to_string(),
    })))
}
