use teloxide::types::CallbackQuery;

use relay_core::{
    domain::{ChatId, UserId},
    messaging::types::{InboundEvent, StopButtonPress, STOP_CALLBACK_DATA},
};

/// Only the inline stop button is understood; anything else is just acknowledged.
pub fn route_callback(q: &CallbackQuery) -> Option<InboundEvent> {
    let chat_id = q.message.as_ref().map(|m| m.chat.id)?;
    if q.data.as_deref() != Some(STOP_CALLBACK_DATA) {
        return None;
    }
    Some(InboundEvent::StopButton(StopButtonPress {
        chat_id: ChatId(chat_id.0),
        user_id: UserId(q.from.id.0 as i64),
        callback_id: q.id.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(data: &str) -> CallbackQuery {
        serde_json::from_value(serde_json::json!({
            "id": "cb-9",
            "from": { "id": 7, "is_bot": false, "first_name": "Ann" },
            "chat_instance": "ci",
            "data": data,
            "message": {
                "message_id": 5,
                "date": 1_700_000_000,
                "chat": { "id": 42, "type": "private", "first_name": "Ann" },
                "text": "⬇️ [1/1] Downloading"
            }
        }))
        .unwrap()
    }

    #[test]
    fn stop_button_maps_to_stop_event() {
        match route_callback(&query(STOP_CALLBACK_DATA)) {
            Some(InboundEvent::StopButton(p)) => {
                assert_eq!(p.callback_id, "cb-9");
                assert_eq!(p.chat_id, ChatId(42));
                assert_eq!(p.user_id, UserId(7));
            }
            other => panic!("unexpected routing: {other:?}"),
        }
    }

    #[test]
    fn foreign_callback_data_is_ignored() {
        assert!(route_callback(&query("something:else")).is_none());
    }
}
