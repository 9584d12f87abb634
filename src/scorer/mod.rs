pub mod pitcher;
pub mod points;

pub use pitcher::score_pitcher_line;
pub use points::score_at_bat;
