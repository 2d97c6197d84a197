use compositor_protocol::{UiResourceBitmap, UiResourceId};

/// UI resource changes committed by the main thread, applied on activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiResourceRequest {
    Create {
        id: UiResourceId,
        bitmap: UiResourceBitmap,
    },
    Delete {
        id: UiResourceId,
    },
}

impl UiResourceRequest {
    pub fn id(&self) -> UiResourceId {
        match self {
            UiResourceRequest::Create { id, .. } | UiResourceRequest::Delete { id } => *id,
        }
    }
}
