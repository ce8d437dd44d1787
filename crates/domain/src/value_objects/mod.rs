//! Value Objects - Immutable, validated synthesis parameters

mod device;
mod input_text;
mod language;
mod output_format;
mod sample_rate;
mod speed;
mod voice;

pub use device::Device;
pub use input_text::InputText;
pub use language::LanguageCode;
pub use output_format::OutputFormat;
pub use sample_rate::SampleRate;
pub use speed::Speed;
pub use voice::{STOCK_VOICES, VOICE_FILE_EXTENSION, VoiceName, voice_group_name};
