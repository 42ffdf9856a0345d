mod core;

pub use self::core::{
    EditingFlags, RendererSettings, SlotMarkup, SlotRenderer, css_variable_name,
};
