pub mod hexcode;
pub mod hexprint;
