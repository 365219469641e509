pub mod text;

pub use text::split_text_max_length;
