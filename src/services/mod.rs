pub mod caption_aligner;
pub mod script_generator;
pub mod speech_synthesizer;
pub mod video_renderer;

pub use caption_aligner::{align, clean_narration};
pub use script_generator::{LlmScriptGenerator, ScriptGenerator};
pub use speech_synthesizer::{ElevenLabsSynthesizer, SpeechSynthesizer};
pub use video_renderer::{HttpVideoRenderer, RenderOutcome, RenderSpec, VideoRenderer};
