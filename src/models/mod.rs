pub mod caption;
pub mod content_item;
pub mod question;
pub mod stage;
pub mod template;

pub use caption::{Alignment, CaptionSegment, WordTiming};
pub use content_item::{ContentItem, ItemPatch, ItemStatus};
pub use question::{QuestionDisplay, QuestionPayload, QuestionRecord, DEFAULT_EXAM_NAME};
pub use stage::Stage;
pub use template::{Rgb, Template, DEFAULT_TEMPLATE_ID, TEMPLATES};
