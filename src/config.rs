use std::sync::Arc;

use crate::types::MessageTypes;

/// Knobs for property validation
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Deepest predicate nesting accepted before checking stops. Parsed
    /// text is also held to [`crate::parser::MAX_TREE_DEPTH`].
    pub max_depth: usize,
    /// Every predicate must mention a field of its own event
    pub require_self_reference: bool,
    /// Message type of each channel, used to type references once resolved
    pub message_types: Option<Arc<MessageTypes>>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            require_self_reference: false,
            message_types: None,
        }
    }
}

impl ValidatorConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_self_references_required(mut self, required: bool) -> Self {
        self.require_self_reference = required;
        self
    }

    pub fn with_message_types(mut self, message_types: MessageTypes) -> Self {
        self.message_types = Some(Arc::new(message_types));
        self
    }
}
