pub mod chart;
pub mod conductor;
pub mod events;
pub mod gameplay;
pub mod hold;
pub mod input;
pub mod judgment;
pub mod life;
pub mod note;
pub mod scores;
pub mod scroll;
pub mod timeline;
