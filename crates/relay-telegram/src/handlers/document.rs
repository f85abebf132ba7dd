use teloxide::types::{Document, Message};

use relay_core::{
    domain::{ChatId, FileRef, UserId},
    messaging::types::{FileUpload, InboundEvent},
};

use super::Routed;

/// Any uploaded document is read as a link list, one entry per line.
pub fn route_document(msg: &Message, doc: &Document) -> Option<Routed> {
    let user = msg.from()?;
    Some(Routed::Event(InboundEvent::FileUpload(FileUpload {
        chat_id: ChatId(msg.chat.id.0),
        user_id: UserId(user.id.0 as i64),
        file: FileRef {
            id: doc.file.id.clone(),
            file_name: doc.file_name.clone(),
            size: u64::from(doc.file.size),
        },
    })))
}
